// crates/assemblit-cli/tests/cli.rs
// ============================================================================
// Module: CLI Integration Tests
// Description: End-to-end runs of the `assemblit` binary.
// Purpose: Validate account, session, dataset, and cascade commands on disk.
// Dependencies: assemblit-cli binary, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Drives the compiled binary against a temporary storage directory:
//! - `init` creates all four database files
//! - A session with an ingested dataset is removed by the session cascade
//! - Configuration failures exit non-zero with a message on stderr

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

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn assemblit_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_assemblit"))
}

fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.yaml");
    let storage = dir.path().join("db");
    let yaml = format!("storage:\n  dir: '{}'\naudit:\n  sink: none\n", storage.display());
    fs::write(&config, yaml).unwrap();
    (dir, config)
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(assemblit_bin())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("run assemblit")
}

fn run_json(config: &Path, args: &[&str]) -> Value {
    let output = run(config, args);
    assert!(
        output.status.success(),
        "assemblit {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json output")
}

fn write_json(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path.display().to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn init_creates_every_database_file() {
    let (_dir, config) = workspace();
    let output = run_json(&config, &["init"]);
    let entries = output.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    for entry in entries {
        let path = entry["path"].as_str().unwrap();
        assert!(Path::new(path).exists(), "missing {path}");
    }
    assert_eq!(entries[0]["database"], "users");
    assert!(entries[0]["tables"].as_array().unwrap().contains(&json!("credentials")));
}

#[test]
fn session_delete_cascades_into_datasets() {
    let (dir, config) = workspace();
    let added = run_json(
        &config,
        &[
            "user",
            "add",
            "--username",
            "Ada@Example.com",
            "--password",
            "hunter22",
            "--first-name",
            "Ada",
        ],
    );
    let user_id = added["user_id"].as_str().unwrap().to_string();
    let login = run_json(
        &config,
        &["user", "login", "--username", "ada@example.com", "--password", "hunter22"],
    );
    assert_eq!(login["user_id"], user_id.as_str());
    assert_eq!(login["first_name"], "Ada");

    let settings = write_json(
        dir.path(),
        "settings.json",
        &json!([{
            "type": "text_input",
            "dtype": "str",
            "parameter": "label",
            "name": "Label",
            "value": "q1"
        }]),
    );
    let created =
        run_json(&config, &["session", "create", "--user-id", &user_id, "--settings", &settings]);
    let session_id = created["session_id"].as_str().unwrap().to_string();

    let upload = write_json(
        dir.path(),
        "upload.json",
        &json!({
            "file_name": "sales.csv",
            "columns": ["region", "units"],
            "rows": [["north", 3], ["south", 5]]
        }),
    );
    let ingested = run_json(
        &config,
        &[
            "dataset",
            "ingest",
            "--session-id",
            &session_id,
            "--user-id",
            &user_id,
            "--file",
            &upload,
        ],
    );
    assert_eq!(ingested["already_ingested"], false);
    assert_eq!(ingested["rows"], 2);
    let dataset_id = ingested["dataset_id"].as_str().unwrap().to_string();
    let count = run_json(&config, &["db", "count", "--database", "data", "--table", &dataset_id]);
    assert_eq!(count["rows"], 2);

    let report = run_json(&config, &["session", "delete", "--session-id", &session_id]);
    assert_eq!(report["kind"], "session");
    assert_eq!(report["removed"]["data"], json!([dataset_id]));
    assert_eq!(report["removed"]["sessions"], json!([session_id]));

    let tables = run_json(&config, &["db", "tables", "--database", "data"]);
    assert!(!tables["tables"].as_array().unwrap().contains(&json!(dataset_id)));
    let sessions = run_json(&config, &["session", "list", "--user-id", &user_id]);
    assert_eq!(sessions["sessions"], json!([]));
}

#[test]
fn user_delete_with_wrong_password_fails() {
    let (_dir, config) = workspace();
    let added = run_json(
        &config,
        &["user", "add", "--username", "ada@example.com", "--password", "hunter22"],
    );
    let user_id = added["user_id"].as_str().unwrap();

    let refused = run(&config, &["user", "delete", "--user-id", user_id, "--password", "nope"]);
    assert!(!refused.status.success());
    assert!(String::from_utf8_lossy(&refused.stderr).contains("Incorrect password."));

    let report =
        run_json(&config, &["user", "delete", "--user-id", user_id, "--password", "hunter22"]);
    assert_eq!(report["kind"], "user");
    let login =
        run(&config, &["user", "login", "--username", "ada@example.com", "--password", "hunter22"]);
    assert!(!login.status.success());
}

#[test]
fn db_query_is_read_only() {
    let (_dir, config) = workspace();
    run_json(
        &config,
        &["user", "add", "--username", "ada@example.com", "--password", "hunter22"],
    );
    let counted = run_json(
        &config,
        &[
            "db",
            "query",
            "--database",
            "users",
            "--sql",
            "SELECT COUNT(*) FROM credentials",
            "--returns",
            "integer",
        ],
    );
    assert_eq!(counted["value"], 1);

    let refused =
        run(&config, &["db", "query", "--database", "users", "--sql", "DELETE FROM credentials"]);
    assert!(!refused.status.success());
    let count =
        run_json(&config, &["db", "count", "--database", "users", "--table", "credentials"]);
    assert_eq!(count["rows"], 1);
}

#[test]
fn config_check_rejects_invalid_files() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, "storage:\n  busy_timeout_ms: 0\n").unwrap();
    let output = run(&config, &["config", "check"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("busy_timeout_ms"));
}

#[test]
fn config_example_passes_config_check() {
    let (dir, config) = workspace();
    let output = run(&config, &["config", "example"]);
    assert!(output.status.success());
    let example = dir.path().join("example.yaml");
    fs::write(&example, &output.stdout).unwrap();
    let checked = run(&example, &["config", "check"]);
    assert!(checked.status.success(), "{}", String::from_utf8_lossy(&checked.stderr));
    assert_eq!(String::from_utf8_lossy(&checked.stdout).trim(), "config ok");
}

#[test]
fn run_commands_require_an_orchestrator_section() {
    let (_dir, config) = workspace();
    let output = run(&config, &["run", "list", "--session-id", "s1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("orchestrator section is required"));
}
