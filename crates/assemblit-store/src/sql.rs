// crates/assemblit-store/src/sql.rs
// ============================================================================
// Module: SQL Text Helpers
// Description: Identifier quoting, literal escaping, and placeholder lists.
// Purpose: Keep every piece of generated SQL text in one place.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Values always travel as bound parameters. Identifiers (table and column
//! names) cannot be bound, so they are validated and double-quoted here.
//! Literal escaping is only used for `DEFAULT` clauses in table definitions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum identifier length accepted for tables and columns.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Validates a table or column identifier.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for empty, overlong, or NUL-bearing names.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::Invalid("identifier must be non-empty".to_string()));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(StoreError::Invalid(format!("identifier exceeds length limit: {name}")));
    }
    if name.contains('\0') {
        return Err(StoreError::Invalid("identifier contains a NUL byte".to_string()));
    }
    Ok(())
}

/// Double-quotes an identifier, doubling embedded double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validates then quotes an identifier.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the identifier is rejected.
pub fn checked_identifier(name: &str) -> Result<String, StoreError> {
    validate_identifier(name)?;
    Ok(quote_identifier(name))
}

// ============================================================================
// SECTION: Literals
// ============================================================================

/// Escapes single quotes in a string literal by doubling them.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Returns `count` comma-separated `?` placeholders.
#[must_use]
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
