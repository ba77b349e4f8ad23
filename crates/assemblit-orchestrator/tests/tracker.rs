// crates/assemblit-orchestrator/tests/tracker.rs
// ============================================================================
// Module: Run Tracker Tests
// Description: Client and tracker behavior against a mock orchestration server.
// Purpose: Validate endpoints, CSRF headers, run rows, and cascade cleanup.
// Dependencies: assemblit-orchestrator, assemblit-store, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Serves canned responses from a local `tiny_http` server and checks:
//! - Run creation sends the CSRF token and client headers
//! - Submitted runs are linked under their session and stored
//! - Refresh maps the server state onto a display status
//! - Non-success statuses fail closed

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use assemblit_config::OrchestratorConfig;
use assemblit_orchestrator::OrchestratorClient;
use assemblit_orchestrator::OrchestratorError;
use assemblit_orchestrator::RunTracker;
use assemblit_store::CascadeOrchestrator;
use assemblit_store::DatabaseRegistry;
use assemblit_store::Filter;
use assemblit_store::LogicalDatabase;
use assemblit_store::NoopAuditSink;
use assemblit_store::RegistryConfig;
use assemblit_store::ReturnType;
use assemblit_store::Scalar;
use assemblit_store::SelectOptions;
use assemblit_store::SessionRecords;
use assemblit_store::SessionState;
use assemblit_store::StoreError;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    #[allow(dead_code, reason = "Recorded for debugging request logs.")]
    url: String,
    csrf_token: Option<String>,
    csrf_client: Option<String>,
    body: String,
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn header(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.to_string())
}

fn route(method: &str, url: &str) -> (u16, Value) {
    match (method, url) {
        ("GET", "/api/health") => (200, json!({})),
        ("GET", "/api/csrf-token?client=assemblit") => (200, json!({"token": "tok-1"})),
        ("GET", "/api/deployments/name/forecast/main") => (200, json!({"id": "dep-1"})),
        ("POST", "/api/deployments/dep-1/create_flow_run") => (
            201,
            json!({
                "id": "run-1",
                "name": "weekly",
                "state": {"type": "SCHEDULED", "name": "Scheduled"},
                "start_time": null,
                "end_time": null,
                "total_run_time": 0.0,
                "parameters": {"horizon": 3},
                "tags": ["assemblit"]
            }),
        ),
        ("GET", "/api/flow_runs/run-1") => (
            200,
            json!({
                "id": "run-1",
                "name": "weekly",
                "state": {"type": "COMPLETED", "name": "Completed"},
                "start_time": "2026-01-05T10:00:00Z",
                "end_time": "2026-01-05T10:00:42Z",
                "total_run_time": 42.5
            }),
        ),
        _ => (404, json!({"detail": "not found"})),
    }
}

fn spawn_server(requests: usize) -> (u16, Log, JoinHandle<()>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let port = server.server_addr().to_ip().expect("ip listener").port();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);
    let handle = std::thread::spawn(move || {
        for _ in 0 .. requests {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).expect("request body");
            let method = request.method().to_string();
            let url = request.url().to_string();
            seen.lock().unwrap().push(Seen {
                csrf_token: header(&request, "prefect-csrf-token"),
                csrf_client: header(&request, "prefect-csrf-client"),
                method: method.clone(),
                url: url.clone(),
                body,
            });
            let (status, payload) = route(&method, &url);
            let response = Response::from_string(payload.to_string())
                .with_status_code(status)
                .with_header(Header::from_bytes("Content-Type", "application/json").unwrap());
            request.respond(response).expect("respond");
        }
    });
    (port, log, handle)
}

fn config(port: u16) -> OrchestratorConfig {
    OrchestratorConfig {
        host: "127.0.0.1".to_string(),
        port,
        api_route: "api".to_string(),
        job_name: "forecast".to_string(),
        deployment_name: "main".to_string(),
        client_name: "assemblit".to_string(),
        timeout_ms: 5_000,
    }
}

fn registry_with_session() -> (TempDir, DatabaseRegistry, String) {
    let dir = TempDir::new().unwrap();
    let registry = DatabaseRegistry::new(RegistryConfig::new(dir.path()));
    registry.initialize().unwrap();
    let settings = json!([
        {
            "type": "text_input",
            "dtype": "str",
            "parameter": "label",
            "name": "Label",
            "value": "draft"
        }
    ]);
    let session_id = SessionRecords::new(&registry).create_session("u1", &settings).unwrap();
    (dir, registry, session_id)
}

fn stored_state(registry: &DatabaseRegistry, run_id: &str) -> Scalar {
    registry
        .database(LogicalDatabase::Analysis)
        .unwrap()
        .select_table_column_value(
            "analysis",
            "state",
            &Filter::eq("run_id", run_id),
            SelectOptions::returning(ReturnType::Text),
        )
        .unwrap()
        .into_one()
        .unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn submit_records_linked_run_and_refresh_updates_state() {
    let (port, log, handle) = spawn_server(4);
    let (_dir, registry, session_id) = registry_with_session();
    let config = config(port);
    let client = OrchestratorClient::new(&config).unwrap();
    let tracker = RunTracker::new(&registry, &client, &config);

    let record = tracker.submit(&session_id, "Ada", "weekly", json!({"horizon": 3})).unwrap();
    assert_eq!(record.run_id, "run-1");
    assert_eq!(record.state.as_deref(), Some("Scheduled"));
    assert_eq!(record.url, format!("http://127.0.0.1:{port}/flow-runs/flow-run/run-1"));
    assert_eq!(tracker.list_runs(&session_id).unwrap(), vec!["run-1".to_string()]);
    assert_eq!(stored_state(&registry, "run-1"), Scalar::text("Scheduled"));

    let refreshed = tracker.refresh("run-1").unwrap();
    assert_eq!(refreshed.state.as_deref(), Some("Succeeded"));
    assert_eq!(refreshed.end_time.as_deref(), Some("2026-01-05T10:00:42Z"));
    assert_eq!(stored_state(&registry, "run-1"), Scalar::text("Succeeded"));
    handle.join().expect("server thread");

    let seen = log.lock().unwrap();
    let create = seen.iter().find(|request| request.method == "POST").expect("create request");
    assert_eq!(create.csrf_token.as_deref(), Some("tok-1"));
    assert_eq!(create.csrf_client.as_deref(), Some("assemblit"));
    let body: Value = serde_json::from_str(&create.body).unwrap();
    assert_eq!(
        body,
        json!({"name": "weekly", "tags": ["assemblit"], "parameters": {"horizon": 3}})
    );
}

#[test]
fn session_cascade_removes_tracked_runs() {
    let (port, _log, handle) = spawn_server(3);
    let (_dir, registry, session_id) = registry_with_session();
    let config = config(port);
    let client = OrchestratorClient::new(&config).unwrap();
    let tracker = RunTracker::new(&registry, &client, &config);
    tracker.submit(&session_id, "Ada", "weekly", json!({})).unwrap();
    handle.join().expect("server thread");

    let report = CascadeOrchestrator::new(&registry, &NoopAuditSink)
        .delete_session(&session_id, &mut SessionState::new())
        .unwrap();
    assert_eq!(report.removed_from(LogicalDatabase::Analysis), &[Scalar::text("run-1")]);
    assert!(tracker.list_runs(&session_id).unwrap().is_empty());
    let remaining = registry
        .database(LogicalDatabase::Analysis)
        .unwrap()
        .select_num_table_records("analysis", None)
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn duplicate_run_name_is_rejected_before_submission() {
    let (port, _log, handle) = spawn_server(3);
    let (_dir, registry, session_id) = registry_with_session();
    let config = config(port);
    let client = OrchestratorClient::new(&config).unwrap();
    let tracker = RunTracker::new(&registry, &client, &config);
    tracker.submit(&session_id, "Ada", "weekly", json!({})).unwrap();
    handle.join().expect("server thread");

    let again = tracker.submit(&session_id, "Ada", " weekly ", json!({}));
    assert!(matches!(again, Err(OrchestratorError::Store(StoreError::RecordExists { .. }))));
}

#[test]
fn health_and_unknown_runs_follow_status_codes() {
    let (port, _log, handle) = spawn_server(2);
    let client = OrchestratorClient::new(&config(port)).unwrap();
    client.health().unwrap();
    let missing = client.get_run("run-404");
    assert!(matches!(missing, Err(OrchestratorError::Status { status: 404, .. })));
    handle.join().expect("server thread");
}

#[test]
fn unreachable_server_is_an_http_error() {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let port = server.server_addr().to_ip().expect("ip listener").port();
    drop(server);
    let client = OrchestratorClient::new(&config(port)).unwrap();
    assert!(matches!(client.health(), Err(OrchestratorError::Http(_))));
}
