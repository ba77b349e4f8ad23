// crates/assemblit-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for bounded reads, parsing, and report rendering.
// Purpose: Ensure CLI inputs fail closed and reports render stable JSON.
// Dependencies: assemblit-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Validates `read_bytes_with_limit`, argument parsing, and cascade report
//! rendering.
//!
//! Security posture: CLI inputs are untrusted; size limits must fail closed.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;

use assemblit_store::CascadeAction;
use assemblit_store::CascadeKind;
use assemblit_store::CascadeReport;
use assemblit_store::CascadeStep;
use assemblit_store::LogicalDatabase;
use assemblit_store::Scalar;
use clap::Parser;
use serde_json::json;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::DatabaseArg;
use super::DbCommand;
use super::ReadLimitError;
use super::read_bytes_with_limit;
use super::read_json;
use super::report_json;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn read_bytes_with_limit_accepts_small_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.json");
    fs::write(&path, b"{}").unwrap();
    let bytes = read_bytes_with_limit(&path, 16).unwrap();
    assert_eq!(bytes, b"{}");
}

#[test]
fn read_bytes_with_limit_rejects_oversized_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.json");
    fs::write(&path, vec![b'a'; 32]).unwrap();
    match read_bytes_with_limit(&path, 16) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 32);
            assert_eq!(limit, 16);
        }
        other => panic!("expected size failure, got {other:?}"),
    }
}

#[test]
fn read_bytes_with_limit_reports_missing_files() {
    let dir = TempDir::new().unwrap();
    let result = read_bytes_with_limit(&dir.path().join("missing.json"), 16);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}

#[test]
fn read_json_names_the_input_kind_on_decode_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, b"not json").unwrap();
    let err = read_json::<serde_json::Value>(&path, "settings", 1024).unwrap_err();
    assert!(err.to_string().starts_with("invalid settings file"));
}

#[test]
fn global_config_flag_parses_after_subcommand() {
    let cli = Cli::try_parse_from([
        "assemblit",
        "db",
        "count",
        "--database",
        "sessions",
        "--table",
        "session",
        "--config",
        "app.yaml",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("app.yaml")));
    let Some(Commands::Db {
        command: DbCommand::Count(command),
    }) = cli.command
    else {
        panic!("expected db count");
    };
    assert_eq!(command.database, DatabaseArg::Sessions);
    assert_eq!(LogicalDatabase::from(command.database), LogicalDatabase::Sessions);
}

#[test]
fn unknown_database_is_rejected_by_the_parser() {
    let result = Cli::try_parse_from(["assemblit", "db", "tables", "--database", "cache"]);
    assert!(result.is_err());
}

#[test]
fn report_json_lists_steps_and_removed_ids() {
    let mut removed = BTreeMap::new();
    removed.insert(LogicalDatabase::Data, vec![Scalar::text("s1_sales")]);
    let report = CascadeReport {
        kind: CascadeKind::Session,
        root_id: "s1".to_string(),
        steps: vec![CascadeStep {
            database: LogicalDatabase::Data,
            action: CascadeAction::DropTable,
            table: "s1_sales".to_string(),
            rows: 3,
        }],
        removed,
    };
    assert_eq!(
        report_json(&report),
        json!({
            "kind": "session",
            "root_id": "s1",
            "steps": [{"database": "data", "action": "drop_table", "table": "s1_sales", "rows": 3}],
            "removed": {"data": ["s1_sales"]},
        })
    );
}
