// crates/assemblit-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for `assemblit config example`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Assemblit configuration. The output is a static
//! template that must parse and validate; a test keeps it honest.

/// Returns a canonical example `.assemblit/config.yaml`.
#[must_use]
pub fn config_yaml_example() -> String {
    String::from(
        r"app:
  name: assemblit
  env: dev
  version: 0.1.0
  debug: false
  require_authentication: true
  client_port: 8501

storage:
  dir: db
  busy_timeout_ms: 5000
  journal_mode: wal
  sync_mode: full
  users:
    name: users
    query_index: user_id
  sessions:
    name: sessions
    query_index: session_id
  data:
    name: data
    query_index: dataset_id
  analysis:
    name: analysis
    query_index: run_id

orchestrator:
  host: localhost
  port: 4200
  api_route: api
  job_name: forecast
  deployment_name: main
  client_name: assemblit
  timeout_ms: 10000

audit:
  sink: file
  path: db/audit.jsonl
",
    )
}
