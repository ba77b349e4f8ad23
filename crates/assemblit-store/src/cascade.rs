// crates/assemblit-store/src/cascade.rs
// ============================================================================
// Module: Cross-Database Cascade
// Description: Dependency-ordered deletes across the four databases.
// Purpose: Delete users, sessions, and datasets without leaving orphans.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The databases share no foreign keys, so integrity between them depends
//! entirely on delete order. Each cascade plans the root level first, then
//! discovers orphans one level down before anything at the current level is
//! removed, recurses, and finally executes its own plan. Children are always
//! gone (or their tables dropped) before the parent rows that referenced them.
//!
//! Each level runs in one transaction. Levels are not atomic with each other:
//! a failure partway leaves the levels below already deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::audit::CascadeAction;
use crate::audit::CascadeKind;
use crate::audit::CascadeStepEvent;
use crate::audit::CascadeStepEventParams;
use crate::audit::CascadeSummaryEvent;
use crate::audit::StoreAuditSink;
use crate::connection::Database;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::plan::DeletionPlan;
use crate::registry::DatabaseRegistry;
use crate::registry::LogicalDatabase;
use crate::resolver::DependencyResolver;
use crate::session::SessionState;
use crate::value::Scalar;

// ============================================================================
// SECTION: Report
// ============================================================================

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeStep {
    /// Database the step ran against.
    pub database: LogicalDatabase,
    /// Action taken.
    pub action: CascadeAction,
    /// Table affected.
    pub table: String,
    /// Rows deleted or held by the dropped table.
    pub rows: usize,
}

/// Ordered record of a cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeReport {
    /// Entry point.
    pub kind: CascadeKind,
    /// Root identifier.
    pub root_id: String,
    /// Steps in execution order.
    pub steps: Vec<CascadeStep>,
    /// Identifiers removed per database.
    pub removed: BTreeMap<LogicalDatabase, Vec<Scalar>>,
}

impl CascadeReport {
    /// Starts an empty report.
    fn new(kind: CascadeKind, root_id: &str) -> Self {
        Self {
            kind,
            root_id: root_id.to_string(),
            steps: Vec::new(),
            removed: BTreeMap::new(),
        }
    }

    /// Returns the identifiers removed from `database`.
    #[must_use]
    pub fn removed_from(&self, database: LogicalDatabase) -> &[Scalar] {
        self.removed.get(&database).map_or(&[], Vec::as_slice)
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Runs user, session, and dataset cascades.
pub struct CascadeOrchestrator<'a> {
    /// Database registry.
    registry: &'a DatabaseRegistry,
    /// Audit sink for executed steps.
    audit: &'a dyn StoreAuditSink,
}

impl<'a> CascadeOrchestrator<'a> {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(registry: &'a DatabaseRegistry, audit: &'a dyn StoreAuditSink) -> Self {
        Self {
            registry,
            audit,
        }
    }

    /// Deletes a user and everything only they reference.
    ///
    /// Orphaned sessions (linked to no other user) are deleted, and with them
    /// orphaned datasets and runs. The user rows go last. The state is logged
    /// out when it belonged to the deleted user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] from the first failing level. Levels already
    /// executed stay deleted.
    pub fn delete_user(
        &self,
        user_id: &str,
        state: &mut SessionState,
    ) -> Result<CascadeReport, StoreError> {
        let mut report = CascadeReport::new(CascadeKind::User, user_id);
        let users = self.registry.database(LogicalDatabase::Users)?;
        let resolver = DependencyResolver::new(users);
        let user_index = self.registry.query_index(LogicalDatabase::Users);
        let session_index = self.registry.query_index(LogicalDatabase::Sessions);
        let user_ids = vec![Scalar::text(user_id)];

        let user_tables = users.select_all_tables_with_column_name(user_index)?;
        let user_plan =
            resolver.build_database_table_objects_to_delete(&user_tables, user_index, &user_ids)?;
        let link_tables = resolver.tables_with_columns(&[user_index, session_index])?;
        let sessions = resolver.create_database_table_dependencies(
            &link_tables,
            user_index,
            &user_ids,
            session_index,
        )?;

        if !sessions.is_empty() {
            self.remove_sessions(&sessions, &mut report)?;
        }
        self.execute(LogicalDatabase::Users, users, &[], &user_plan, &mut report)?;
        report.removed.insert(LogicalDatabase::Users, user_ids);

        if state.user().is_some_and(|user| user.user_id == user_id) {
            state.logout();
        }
        reset_state(state, &report);
        state.log_success(LogicalDatabase::Users, "Account deleted.");
        self.finish(&report);
        Ok(report)
    }

    /// Deletes a session, its link rows, and its orphaned datasets and runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] from the first failing level.
    pub fn delete_session(
        &self,
        session_id: &str,
        state: &mut SessionState,
    ) -> Result<CascadeReport, StoreError> {
        let mut report = CascadeReport::new(CascadeKind::Session, session_id);
        let users = self.registry.database(LogicalDatabase::Users)?;
        let session_index = self.registry.query_index(LogicalDatabase::Sessions);
        let session_ids = vec![Scalar::text(session_id)];

        let link_tables = users.select_all_tables_with_column_name(session_index)?;
        let user_plan = DependencyResolver::new(users).build_database_table_objects_to_delete(
            &link_tables,
            session_index,
            &session_ids,
        )?;

        self.remove_sessions(&session_ids, &mut report)?;
        self.execute(LogicalDatabase::Users, users, &[], &user_plan, &mut report)?;

        reset_state(state, &report);
        state.log_success(LogicalDatabase::Sessions, "Session deleted.");
        self.finish(&report);
        Ok(report)
    }

    /// Drops a dataset table and removes its metadata and session links.
    ///
    /// Only ids registered in the dataset metadata table are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when `dataset_id` names the metadata
    /// table, and [`StoreError`] from the first failing level otherwise.
    pub fn delete_dataset(
        &self,
        dataset_id: &str,
        state: &mut SessionState,
    ) -> Result<CascadeReport, StoreError> {
        if self.is_metadata_table(dataset_id) {
            return Err(StoreError::Invalid(format!(
                "{dataset_id} is the dataset metadata table, not a dataset"
            )));
        }
        let mut report = CascadeReport::new(CascadeKind::Dataset, dataset_id);
        let sessions = self.registry.database(LogicalDatabase::Sessions)?;
        let data_index = self.registry.query_index(LogicalDatabase::Data);
        let dataset_ids = vec![Scalar::text(dataset_id)];

        let link_tables = sessions.select_all_tables_with_column_name(data_index)?;
        let session_plan = DependencyResolver::new(sessions).build_database_table_objects_to_delete(
            &link_tables,
            data_index,
            &dataset_ids,
        )?;

        self.remove_datasets(&dataset_ids, &mut report)?;
        self.execute(LogicalDatabase::Sessions, sessions, &[], &session_plan, &mut report)?;

        reset_state(state, &report);
        state.log_success(LogicalDatabase::Data, "Dataset deleted.");
        self.finish(&report);
        Ok(report)
    }

    /// Sessions level: plan, resolve orphaned datasets and runs, recurse,
    /// then delete session rows.
    fn remove_sessions(
        &self,
        session_ids: &[Scalar],
        report: &mut CascadeReport,
    ) -> Result<(), StoreError> {
        let sessions = self.registry.database(LogicalDatabase::Sessions)?;
        let resolver = DependencyResolver::new(sessions);
        let session_index = self.registry.query_index(LogicalDatabase::Sessions);
        let data_index = self.registry.query_index(LogicalDatabase::Data);
        let run_index = self.registry.query_index(LogicalDatabase::Analysis);

        let tables = sessions.select_all_tables_with_column_name(session_index)?;
        let plan =
            resolver.build_database_table_objects_to_delete(&tables, session_index, session_ids)?;
        let dataset_tables = resolver.tables_with_columns(&[session_index, data_index])?;
        let datasets = resolver.create_database_table_dependencies(
            &dataset_tables,
            session_index,
            session_ids,
            data_index,
        )?;
        let run_tables = resolver.tables_with_columns(&[session_index, run_index])?;
        let runs = resolver.create_database_table_dependencies(
            &run_tables,
            session_index,
            session_ids,
            run_index,
        )?;

        if !datasets.is_empty() {
            self.remove_datasets(&datasets, report)?;
        }
        if !runs.is_empty() {
            self.remove_runs(&runs, report)?;
        }
        self.execute(LogicalDatabase::Sessions, sessions, &[], &plan, report)?;
        report.removed.insert(LogicalDatabase::Sessions, session_ids.to_vec());
        Ok(())
    }

    /// Data level: drop each dataset table and delete its metadata in one
    /// transaction.
    fn remove_datasets(
        &self,
        dataset_ids: &[Scalar],
        report: &mut CascadeReport,
    ) -> Result<(), StoreError> {
        let data = self.registry.database(LogicalDatabase::Data)?;
        let data_index = self.registry.query_index(LogicalDatabase::Data);
        let drops = self.registered_datasets(data, dataset_ids)?;
        let tables: Vec<String> = data
            .select_all_tables_with_column_name(data_index)?
            .into_iter()
            .filter(|table| !drops.contains(table))
            .collect();
        let plan = DependencyResolver::new(data).build_database_table_objects_to_delete(
            &tables,
            data_index,
            dataset_ids,
        )?;
        self.execute(LogicalDatabase::Data, data, &drops, &plan, report)?;
        report.removed.insert(LogicalDatabase::Data, drops.iter().map(Scalar::text).collect());
        Ok(())
    }

    /// Keeps the ids that have a metadata row; only those tables may be dropped.
    fn registered_datasets(
        &self,
        data: &Database,
        dataset_ids: &[Scalar],
    ) -> Result<Vec<String>, StoreError> {
        let metadata = self.registry.name(LogicalDatabase::Data);
        if !data.table_exists(metadata)? {
            return Ok(Vec::new());
        }
        let data_index = self.registry.query_index(LogicalDatabase::Data);
        let mut registered = Vec::new();
        for id in dataset_ids {
            let name = id.to_string();
            if self.is_metadata_table(&name) || registered.contains(&name) {
                continue;
            }
            if data.table_record_exists(metadata, &Filter::eq(data_index, id.clone()))? {
                registered.push(name);
            }
        }
        Ok(registered)
    }

    /// Returns true when `name` is the dataset metadata table.
    fn is_metadata_table(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(self.registry.name(LogicalDatabase::Data))
    }

    /// Analysis level: delete run records.
    fn remove_runs(
        &self,
        run_ids: &[Scalar],
        report: &mut CascadeReport,
    ) -> Result<(), StoreError> {
        let analysis = self.registry.database(LogicalDatabase::Analysis)?;
        let run_index = self.registry.query_index(LogicalDatabase::Analysis);
        let tables = analysis.select_all_tables_with_column_name(run_index)?;
        let plan = DependencyResolver::new(analysis).build_database_table_objects_to_delete(
            &tables, run_index, run_ids,
        )?;
        self.execute(LogicalDatabase::Analysis, analysis, &[], &plan, report)?;
        report.removed.insert(LogicalDatabase::Analysis, run_ids.to_vec());
        Ok(())
    }

    /// Executes one level and records its steps.
    fn execute(
        &self,
        database: LogicalDatabase,
        handle: &Database,
        drops: &[String],
        plan: &DeletionPlan,
        report: &mut CascadeReport,
    ) -> Result<(), StoreError> {
        if drops.is_empty() && plan.is_empty() {
            return Ok(());
        }
        let summary = handle.purge(drops, plan)?;
        let steps = summary
            .dropped
            .into_iter()
            .map(|count| (CascadeAction::DropTable, count))
            .chain(summary.deleted.into_iter().map(|count| (CascadeAction::Delete, count)));
        for (action, count) in steps {
            let step = CascadeStep {
                database,
                action,
                table: count.table,
                rows: count.rows,
            };
            self.audit.record_step(&CascadeStepEvent::new(CascadeStepEventParams {
                cascade: report.kind,
                root_id: report.root_id.clone(),
                database,
                action,
                table: step.table.clone(),
                rows: step.rows,
            }));
            report.steps.push(step);
        }
        Ok(())
    }

    /// Emits the cascade summary.
    fn finish(&self, report: &CascadeReport) {
        let removed =
            report.removed.iter().map(|(database, ids)| (*database, ids.len())).collect();
        self.audit.record_summary(&CascadeSummaryEvent::new(
            report.kind,
            report.root_id.clone(),
            report.steps.len(),
            removed,
        ));
    }
}

/// Clears selections that point at removed records.
fn reset_state(state: &mut SessionState, report: &CascadeReport) {
    for (database, removed) in &report.removed {
        state.clear_if_selected(*database, removed);
    }
}
