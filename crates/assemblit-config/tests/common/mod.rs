// crates/assemblit-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for assemblit-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use assemblit_config::AssemblitConfig;
use assemblit_config::ConfigError;
use assemblit_config::OrchestratorConfig;

/// Parses a YAML string into an `AssemblitConfig` for tests.
pub fn config_from_yaml(yaml: &str) -> Result<AssemblitConfig, ConfigError> {
    AssemblitConfig::from_yaml(yaml)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<AssemblitConfig, ConfigError> {
    config_from_yaml("")
}

/// Returns a minimal config with an orchestration server.
pub fn config_with_orchestrator() -> Result<AssemblitConfig, ConfigError> {
    let mut config = minimal_config()?;
    config.orchestrator = Some(OrchestratorConfig {
        host: "localhost".to_string(),
        port: 4200,
        api_route: "api".to_string(),
        job_name: "forecast".to_string(),
        deployment_name: "main".to_string(),
        client_name: "assemblit".to_string(),
        timeout_ms: 10_000,
    });
    Ok(config)
}

/// Checks that `result` failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
