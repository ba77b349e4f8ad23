// crates/assemblit-store/src/error.rs
// ============================================================================
// Module: Store Errors
// Description: Error taxonomy for the sqlite persistence layer.
// Purpose: Give every cardinality, shape, and engine failure a distinct name.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! All store operations return [`StoreError`]. Shape and validation errors are
//! raised before any statement touches the database. Cardinality errors carry
//! the query text so callers can report what was asked. [`StoreError::NullReturnValue`]
//! is the ordinary "nothing matched" signal; [`OptionalSelect`] turns it into
//! `Option::None` for call sites that expect absence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the sqlite persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure (database directory, file metadata).
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid identifier, path, filter, or statement.
    #[error("sqlite store invalid input: {0}")]
    Invalid(String),
    /// A logical kind with no storage mapping.
    #[error("datatype {{kind: '{kind}'}} is not recognized")]
    UnsupportedType {
        /// Kind code or name that was rejected.
        kind: String,
    },
    /// Row columns do not match the live table column order.
    #[error(
        "missing values: the sqlite {table} table in {database} expects values in the following \
         order, [{}]",
        .expected.join(", ")
    )]
    Shape {
        /// Target table.
        table: String,
        /// Database file name.
        database: String,
        /// Live column order.
        expected: Vec<String>,
    },
    /// Malformed field descriptor list.
    #[error("invalid field descriptor: {0}")]
    InvalidField(String),
    /// The query matched no rows.
    #[error("the query {query} returned a null value")]
    NullReturnValue {
        /// Query text.
        query: String,
    },
    /// The query matched more rows than the caller allowed.
    #[error("the query {query} returned more than one value")]
    AmbiguousResult {
        /// Query text.
        query: String,
    },
    /// Insert validation found an existing matching record.
    #[error("table record already exists in {table}")]
    RecordExists {
        /// Target table.
        table: String,
    },
    /// Update filter matched no record.
    #[error("the query attempted to update a record in {table} but none matched")]
    UpdateNoMatch {
        /// Target table.
        table: String,
    },
    /// Update filter matched more than one record.
    #[error("the query attempted to update more than one record in {table} ({matched} matched)")]
    UpdateAmbiguous {
        /// Target table.
        table: String,
        /// Number of matching records.
        matched: u64,
    },
    /// A stored value could not be converted to the requested return type.
    #[error("{value} value cannot be converted to {target}")]
    Coercion {
        /// Rendered source value.
        value: String,
        /// Requested target type label.
        target: &'static str,
    },
}

// ============================================================================
// SECTION: Optional Results
// ============================================================================

/// Converts [`StoreError::NullReturnValue`] into `Ok(None)`.
pub trait OptionalSelect<T> {
    /// Returns `Ok(None)` when the query matched nothing.
    ///
    /// # Errors
    ///
    /// Returns every other [`StoreError`] unchanged.
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalSelect<T> for Result<T, StoreError> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::NullReturnValue {
                ..
            }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
