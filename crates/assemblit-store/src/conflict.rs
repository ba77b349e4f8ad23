// crates/assemblit-store/src/conflict.rs
// ============================================================================
// Module: Conflict Clauses
// Description: Conflict resolution keywords for constraint violations.
// Purpose: Supply the ON CONFLICT clauses emitted in table definitions.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Every constraint the layer declares (`NOT NULL`, `UNIQUE`, `PRIMARY KEY`)
//! carries an `ON CONFLICT` clause. The policy is fixed at ABORT for all three.

// ============================================================================
// SECTION: Types
// ============================================================================

/// `SQLite` conflict resolution algorithm.
///
/// Only ABORT is emitted: a violating statement is undone while the rows
/// already written in its transaction stay pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictResolution {
    /// Abort the statement, keep prior statements.
    #[default]
    Abort,
}

impl ConflictResolution {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
        }
    }
}

/// Conflict clauses applied to column and table constraints.
///
/// # Invariants
/// - The default policy resolves every constraint class with ABORT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictPolicy {
    /// Resolution for `NOT NULL` violations.
    pub nullable: ConflictResolution,
    /// Resolution for `UNIQUE` violations.
    pub unique: ConflictResolution,
    /// Resolution for `PRIMARY KEY` violations.
    pub primary_key: ConflictResolution,
}

impl ConflictPolicy {
    /// Clause appended to `NOT NULL`.
    #[must_use]
    pub fn nullable_clause(&self) -> String {
        format!("ON CONFLICT {}", self.nullable.keyword())
    }

    /// Clause appended to `UNIQUE`.
    #[must_use]
    pub fn unique_clause(&self) -> String {
        format!("ON CONFLICT {}", self.unique.keyword())
    }

    /// Clause appended to `PRIMARY KEY(...)`.
    #[must_use]
    pub fn primary_key_clause(&self) -> String {
        format!("ON CONFLICT {}", self.primary_key.keyword())
    }
}
