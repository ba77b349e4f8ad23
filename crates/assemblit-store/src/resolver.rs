// crates/assemblit-store/src/resolver.rs
// ============================================================================
// Module: Dependency Resolver
// Description: Orphan detection and deletion planning within one database.
// Purpose: Find rows that would be left dangling and plan their removal.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Cross-file foreign keys do not exist, so referential integrity is kept by
//! reading before deleting. The resolver works in two steps per database:
//! catalog introspection finds which tables carry a column, then a grouped
//! count per table finds dependent values referenced exactly once, by a row
//! that is about to go. Reads and deletes are separate round-trips; a write in
//! between can invalidate the result and is not detected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::connection::Database;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::plan::DeletionPlan;
use crate::sql::checked_identifier;
use crate::value::Scalar;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Orphan queries and deletion planning over one [`Database`].
#[derive(Clone, Copy)]
pub struct DependencyResolver<'a> {
    /// Database being resolved.
    database: &'a Database,
}

impl<'a> DependencyResolver<'a> {
    /// Creates a resolver for `database`.
    #[must_use]
    pub const fn new(database: &'a Database) -> Self {
        Self {
            database,
        }
    }

    /// Returns values of `column` that occur exactly once in `table` and
    /// whose row matches `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid identifiers or engine failures.
    pub fn select_orphaned_table_column_values(
        &self,
        table: &str,
        column: &str,
        filter: &Filter,
    ) -> Result<Vec<Scalar>, StoreError> {
        let quoted = checked_identifier(column)?;
        let rendered = filter.render(false)?;
        let mut grouped = vec![quoted.clone()];
        for filter_column in filter.columns() {
            if filter_column != column {
                grouped.push(checked_identifier(filter_column)?);
            }
        }
        let sql = format!(
            "SELECT {quoted} FROM (SELECT {}, COUNT({quoted}) AS orphan_count FROM {} GROUP BY \
             {quoted}) WHERE orphan_count = 1 AND {} ORDER BY {quoted}",
            grouped.join(", "),
            checked_identifier(table)?,
            rendered.clause
        );
        self.database.select_column(&sql, &rendered.params)
    }

    /// Accumulates orphaned `dependent_query_index` values over `tables`.
    ///
    /// Each table is checked with `query_index IN query_index_values`. Values
    /// are deduplicated, first occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failing table.
    pub fn create_database_table_dependencies(
        &self,
        tables: &[String],
        query_index: &str,
        query_index_values: &[Scalar],
        dependent_query_index: &str,
    ) -> Result<Vec<Scalar>, StoreError> {
        let filter = Filter::any_of(query_index, query_index_values.to_vec());
        let mut orphaned: Vec<Scalar> = Vec::new();
        for table in tables {
            for value in
                self.select_orphaned_table_column_values(table, dependent_query_index, &filter)?
            {
                if !orphaned.contains(&value) {
                    orphaned.push(value);
                }
            }
        }
        Ok(orphaned)
    }

    /// Plans `query_index IN query_index_values` deletes for each table that
    /// has at least one matching record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failing existence check.
    pub fn build_database_table_objects_to_delete(
        &self,
        tables: &[String],
        query_index: &str,
        query_index_values: &[Scalar],
    ) -> Result<DeletionPlan, StoreError> {
        let mut plan = DeletionPlan::new();
        if query_index_values.is_empty() {
            return Ok(plan);
        }
        let filter = Filter::any_of(query_index, query_index_values.to_vec());
        for table in tables {
            if self.database.table_record_exists(table, &filter)? {
                plan.push(table.clone(), filter.clone());
            }
        }
        Ok(plan)
    }

    /// Returns the tables carrying every column in `columns`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on engine failures.
    pub fn tables_with_columns(&self, columns: &[&str]) -> Result<Vec<String>, StoreError> {
        let Some((first, rest)) = columns.split_first() else {
            return Ok(Vec::new());
        };
        let mut tables = self.database.select_all_tables_with_column_name(first)?;
        for column in rest {
            let carrying = self.database.select_all_tables_with_column_name(column)?;
            tables.retain(|table| carrying.contains(table));
        }
        Ok(tables)
    }
}
