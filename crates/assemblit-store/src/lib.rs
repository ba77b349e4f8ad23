// crates/assemblit-store/src/lib.rs
// ============================================================================
// Module: Assemblit Store Library
// Description: Sqlite persistence and cross-database cascade deletes.
// Purpose: Store users, sessions, datasets, and runs without orphaned rows.
// Dependencies: rusqlite, serde, serde_json, sha2, thiserror, time
// ============================================================================

//! ## Overview
//! Assemblit keeps four independent sqlite files (users, sessions, data,
//! analysis) opened through a [`DatabaseRegistry`]. [`Database`] provides
//! table, row, and query operations over one file; [`Schema`] compiles typed
//! column declarations to DDL; [`DependencyResolver`] finds rows that a delete
//! would orphan; [`CascadeOrchestrator`] walks the databases in dependency
//! order so children are removed before the parents that referenced them.
//! Invariants:
//! - Inserted rows match the live column order exactly.
//! - Updates touch exactly one row or none.
//! - Values are bound as parameters; identifiers are validated and quoted.
//!
//! Cross-file deletes are ordered but not atomic; see [`cascade`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod cascade;
pub mod conflict;
pub mod connection;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod hashing;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod sql;
pub mod tables;
pub mod types;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::CascadeAction;
pub use audit::CascadeKind;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::StoreAuditSink;
pub use cascade::CascadeOrchestrator;
pub use cascade::CascadeReport;
pub use cascade::CascadeStep;
pub use conflict::ConflictPolicy;
pub use conflict::ConflictResolution;
pub use connection::Database;
pub use connection::DatabaseConfig;
pub use connection::QueryValue;
pub use connection::SelectOptions;
pub use connection::SortOrder;
pub use connection::SqliteJournalMode;
pub use connection::SqliteSyncMode;
pub use dataset::DatasetIngestor;
pub use dataset::DatasetUpload;
pub use dataset::IngestOutcome;
pub use error::OptionalSelect;
pub use error::StoreError;
pub use filter::Assignment;
pub use filter::Filter;
pub use filter::FilterValue;
pub use filter::Row;
pub use plan::DeletionPlan;
pub use plan::PurgeSummary;
pub use registry::DatabaseRegistry;
pub use registry::DatabaseSettings;
pub use registry::LogicalDatabase;
pub use registry::RegistryConfig;
pub use resolver::DependencyResolver;
pub use schema::ColumnSpec;
pub use schema::FieldDescriptor;
pub use schema::Schema;
pub use session::SessionRecords;
pub use session::SessionState;
pub use types::LogicalType;
pub use types::StorageAffinity;
pub use value::ReturnType;
pub use value::Scalar;
