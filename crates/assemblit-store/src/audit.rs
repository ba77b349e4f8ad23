// crates/assemblit-store/src/audit.rs
// ============================================================================
// Module: Store Audit Logging
// Description: Structured audit events for cascade deletes.
// Purpose: Emit JSON-lines records of every destructive step.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Cascades report each executed step and a closing summary through a
//! [`StoreAuditSink`]. Events carry identifiers, table names, and row counts;
//! never row contents. Sinks are deliberately small so deployments can route
//! events wherever they log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::registry::LogicalDatabase;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Cascade entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeKind {
    /// Account deletion.
    User,
    /// Session deletion.
    Session,
    /// Dataset deletion.
    Dataset,
}

/// Destructive action taken by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeAction {
    /// A dataset table was dropped.
    DropTable,
    /// Rows were deleted.
    Delete,
}

/// One executed cascade step.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeStepEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Cascade entry point.
    pub cascade: CascadeKind,
    /// Root identifier of the cascade.
    pub root_id: String,
    /// Database the step ran against.
    pub database: LogicalDatabase,
    /// Action taken.
    pub action: CascadeAction,
    /// Table affected.
    pub table: String,
    /// Rows deleted or held by the dropped table.
    pub rows: usize,
}

/// Cascade completion summary.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeSummaryEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Cascade entry point.
    pub cascade: CascadeKind,
    /// Root identifier of the cascade.
    pub root_id: String,
    /// Number of executed steps.
    pub steps: usize,
    /// Removed identifier counts per database.
    pub removed: BTreeMap<LogicalDatabase, usize>,
}

/// Inputs required to construct a step event.
pub struct CascadeStepEventParams {
    /// Cascade entry point.
    pub cascade: CascadeKind,
    /// Root identifier of the cascade.
    pub root_id: String,
    /// Database the step ran against.
    pub database: LogicalDatabase,
    /// Action taken.
    pub action: CascadeAction,
    /// Table affected.
    pub table: String,
    /// Rows affected.
    pub rows: usize,
}

impl CascadeStepEvent {
    /// Creates a step event with a consistent timestamp.
    #[must_use]
    pub fn new(params: CascadeStepEventParams) -> Self {
        Self {
            event: "cascade_step",
            timestamp_ms: timestamp_ms(),
            cascade: params.cascade,
            root_id: params.root_id,
            database: params.database,
            action: params.action,
            table: params.table,
            rows: params.rows,
        }
    }
}

impl CascadeSummaryEvent {
    /// Creates a summary event with a consistent timestamp.
    #[must_use]
    pub fn new(
        cascade: CascadeKind,
        root_id: String,
        steps: usize,
        removed: BTreeMap<LogicalDatabase, usize>,
    ) -> Self {
        Self {
            event: "cascade_complete",
            timestamp_ms: timestamp_ms(),
            cascade,
            root_id,
            steps,
            removed,
        }
    }
}

/// Milliseconds since the Unix epoch.
fn timestamp_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for cascade events.
pub trait StoreAuditSink: Send + Sync {
    /// Records an executed step.
    fn record_step(&self, event: &CascadeStepEvent);

    /// Records a cascade summary.
    fn record_summary(&self, _event: &CascadeSummaryEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StoreAuditSink for StderrAuditSink {
    fn record_step(&self, event: &CascadeStepEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_summary(&self, event: &CascadeSummaryEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl StoreAuditSink for FileAuditSink {
    fn record_step(&self, event: &CascadeStepEvent) {
        self.append(event);
    }

    fn record_summary(&self, event: &CascadeSummaryEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl StoreAuditSink for NoopAuditSink {
    fn record_step(&self, _event: &CascadeStepEvent) {}

    fn record_summary(&self, _event: &CascadeSummaryEvent) {}
}
