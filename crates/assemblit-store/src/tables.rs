// crates/assemblit-store/src/tables.rs
// ============================================================================
// Module: Built-in Tables
// Description: Schemas for credentials, link tables, datasets, and runs.
// Purpose: Define the tables every deployment creates on initialization.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Parent databases hold one link table per child database, named after the
//! child database and keyed by both query indexes. Those link tables are what
//! the cascade walks: users → sessions → data/analysis.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::StoreError;
use crate::registry::LogicalDatabase;
use crate::registry::RegistryConfig;
use crate::schema::ColumnSpec;
use crate::schema::Schema;
use crate::types::LogicalType;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Credentials table in the users database.
pub const CREDENTIALS_TABLE: &str = "credentials";
/// Session settings table in the sessions database.
pub const SETTINGS_TABLE: &str = "settings";
/// Login name column.
pub const USERNAME_COLUMN: &str = "username";
/// Password hash column.
pub const PASSWORD_COLUMN: &str = "password";
/// Display name column.
pub const FIRST_NAME_COLUMN: &str = "first_name";
/// Creation timestamp column.
pub const CREATED_ON_COLUMN: &str = "created_on";
/// Run state column in the analysis table.
pub const STATE_COLUMN: &str = "state";

/// Dataset metadata columns after the query index, in table order.
pub const DATASET_METADATA_COLUMNS: [(&str, LogicalType); 11] = [
    ("uploaded_by", LogicalType::Text),
    (CREATED_ON_COLUMN, LogicalType::Datetime),
    ("final", LogicalType::Text),
    ("version", LogicalType::Integer),
    ("file_name", LogicalType::Text),
    ("dbms", LogicalType::Text),
    ("dimensions", LogicalType::Text),
    ("metrics", LogicalType::Text),
    ("row_count", LogicalType::Integer),
    ("size_mb", LogicalType::Real),
    ("sha256", LogicalType::Text),
];

/// Analysis run columns after the query index, in table order. The flag
/// marks columns that stay null until the run reports back.
pub const ANALYSIS_COLUMNS: [(&str, LogicalType, bool); 11] = [
    ("name", LogicalType::Text, false),
    ("server_type", LogicalType::Text, false),
    ("submitted_by", LogicalType::Text, false),
    (CREATED_ON_COLUMN, LogicalType::Datetime, false),
    (STATE_COLUMN, LogicalType::Text, true),
    ("start_time", LogicalType::Text, true),
    ("end_time", LogicalType::Text, true),
    ("run_time", LogicalType::Real, true),
    ("parameters", LogicalType::Text, false),
    ("tags", LogicalType::Text, false),
    ("url", LogicalType::Text, false),
];

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Credentials keyed by the user query index.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for invalid column names.
pub fn credentials_schema(user_index: &str) -> Result<Schema, StoreError> {
    Schema::builder(CREDENTIALS_TABLE)
        .column(user_index, ColumnSpec::text().not_null().unique().primary_key())
        .column(USERNAME_COLUMN, ColumnSpec::text().not_null().unique())
        .column(PASSWORD_COLUMN, ColumnSpec::text().not_null())
        .column(FIRST_NAME_COLUMN, ColumnSpec::text())
        .column(CREATED_ON_COLUMN, ColumnSpec::new(LogicalType::Datetime))
        .build()
}

/// Parent-to-child link table with a composite key.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for invalid names.
pub fn link_schema(
    table: &str,
    parent_index: &str,
    child_index: &str,
) -> Result<Schema, StoreError> {
    Schema::builder(table)
        .column(parent_index, ColumnSpec::text().not_null().primary_key())
        .column(child_index, ColumnSpec::text().not_null().primary_key())
        .build()
}

/// Dataset metadata keyed by the dataset query index.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for invalid names.
pub fn dataset_metadata_schema(table: &str, dataset_index: &str) -> Result<Schema, StoreError> {
    DATASET_METADATA_COLUMNS
        .iter()
        .fold(
            Schema::builder(table)
                .column(dataset_index, ColumnSpec::text().not_null().unique().primary_key()),
            |builder, (name, kind)| {
                let spec = ColumnSpec::new(*kind);
                let spec =
                    if *name == "final" { spec.not_null().with_default(false) } else { spec };
                builder.column(*name, spec)
            },
        )
        .build()
}

/// Analysis runs keyed by the run query index.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for invalid names.
pub fn analysis_schema(table: &str, run_index: &str) -> Result<Schema, StoreError> {
    ANALYSIS_COLUMNS
        .iter()
        .fold(
            Schema::builder(table)
                .column(run_index, ColumnSpec::text().not_null().unique().primary_key()),
            |builder, (name, kind, nullable)| {
                let spec = ColumnSpec::new(*kind);
                let spec = if *nullable { spec } else { spec.not_null() };
                let spec = if *name == "name" { spec.unique() } else { spec };
                builder.column(*name, spec)
            },
        )
        .build()
}

/// Every built-in table, paired with the database that holds it.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when a configured name is invalid.
pub fn builtin_schemas(
    config: &RegistryConfig,
) -> Result<Vec<(LogicalDatabase, Schema)>, StoreError> {
    let users = &config.users.query_index;
    let sessions = &config.sessions.query_index;
    let data = &config.data.query_index;
    let runs = &config.analysis.query_index;
    Ok(vec![
        (LogicalDatabase::Users, credentials_schema(users)?),
        (LogicalDatabase::Users, link_schema(&config.sessions.name, users, sessions)?),
        (LogicalDatabase::Sessions, link_schema(&config.data.name, sessions, data)?),
        (LogicalDatabase::Sessions, link_schema(&config.analysis.name, sessions, runs)?),
        (LogicalDatabase::Data, dataset_metadata_schema(&config.data.name, data)?),
        (LogicalDatabase::Analysis, analysis_schema(&config.analysis.name, runs)?),
    ])
}
