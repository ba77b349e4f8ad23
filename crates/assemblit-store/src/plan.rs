// crates/assemblit-store/src/plan.rs
// ============================================================================
// Module: Deletion Plans
// Description: Ordered table/filter pairs and purge outcomes.
// Purpose: Carry one cascade level's deletes from resolver to connection.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`DeletionPlan`] lists `{table, filter}` entries for one database. The
//! resolver builds it, the connection executes it in list order inside one
//! transaction, and it is discarded afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::filter::Filter;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One delete against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    /// Target table.
    pub table: String,
    /// Rows to delete.
    pub filter: Filter,
}

/// Ordered deletes for a single database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeletionPlan {
    /// Entries in execution order.
    entries: Vec<PlanEntry>,
}

impl DeletionPlan {
    /// Creates an empty plan.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn push(&mut self, table: impl Into<String>, filter: Filter) {
        self.entries.push(PlanEntry {
            table: table.into(),
            filter,
        });
    }

    /// Returns the entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Returns the planned table names in order.
    #[must_use]
    pub fn tables(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.table.as_str()).collect()
    }

    /// Returns true when nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Rows affected in one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    /// Table name.
    pub table: String,
    /// Rows deleted, or rows held by a dropped table.
    pub rows: usize,
}

/// Result of dropping tables and executing a plan in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    /// Dropped tables, in drop order.
    pub dropped: Vec<TableCount>,
    /// Plan entries, in execution order.
    pub deleted: Vec<TableCount>,
}

impl PurgeSummary {
    /// Total rows deleted by plan entries.
    #[must_use]
    pub fn deleted_rows(&self) -> usize {
        self.deleted.iter().map(|count| count.rows).sum()
    }
}
