// crates/assemblit-orchestrator/src/tracker.rs
// ============================================================================
// Module: Run Tracker
// Description: Records submitted runs in the analysis database.
// Purpose: Keep run rows linked under their session and refresh their state.
// Dependencies: assemblit-config, assemblit-store, serde_json
// ============================================================================

//! ## Overview
//! A submitted run is written in two places: the session-to-run link table
//! in the sessions database, then the run row in the analysis database. The
//! link goes first so a failure cannot leave an analysis row no session
//! reaches; the session cascade removes both.

// ============================================================================
// SECTION: Imports
// ============================================================================

use assemblit_config::OrchestratorConfig;
use assemblit_store::Assignment;
use assemblit_store::DatabaseRegistry;
use assemblit_store::Filter;
use assemblit_store::LogicalDatabase;
use assemblit_store::OptionalSelect;
use assemblit_store::Row;
use assemblit_store::Scalar;
use assemblit_store::SelectOptions;
use assemblit_store::StoreError;
use assemblit_store::tables::CREATED_ON_COLUMN;
use assemblit_store::tables::STATE_COLUMN;
use assemblit_store::value::now_utc;
use serde::Serialize;
use serde_json::Value;

use crate::client::FlowRun;
use crate::client::OrchestratorClient;
use crate::client::OrchestratorError;
use crate::client::RunRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server type stored with each run.
pub const SERVER_TYPE: &str = "prefect";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tracked run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: String,
    /// Run name.
    pub name: String,
    /// Status label.
    pub state: Option<String>,
    /// Start timestamp.
    pub start_time: Option<String>,
    /// End timestamp.
    pub end_time: Option<String>,
    /// Run time in seconds.
    pub run_time: f64,
    /// Dashboard link.
    pub url: String,
}

impl RunRecord {
    /// Builds a summary from a server run.
    fn from_run(run: &FlowRun, url: String) -> Self {
        Self {
            run_id: run.id.clone(),
            name: run.name.clone(),
            state: run.status_label(),
            start_time: run.start_time.clone(),
            end_time: run.end_time.clone(),
            run_time: run.total_run_time,
            url,
        }
    }
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Submits runs and mirrors their state into the analysis database.
pub struct RunTracker<'a> {
    /// Database registry.
    registry: &'a DatabaseRegistry,
    /// Orchestration client.
    client: &'a OrchestratorClient,
    /// Job and deployment names.
    config: &'a OrchestratorConfig,
}

impl<'a> RunTracker<'a> {
    /// Creates a tracker.
    #[must_use]
    pub const fn new(
        registry: &'a DatabaseRegistry,
        client: &'a OrchestratorClient,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            client,
            config,
        }
    }

    /// Submits a run for `session_id` and records it.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] with [`StoreError::RecordExists`]
    /// when a run with `name` is already tracked, and server or storage
    /// errors otherwise.
    pub fn submit(
        &self,
        session_id: &str,
        submitted_by: &str,
        name: &str,
        parameters: Value,
    ) -> Result<RunRecord, OrchestratorError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OrchestratorError::Config("run name must be non-empty".to_string()));
        }
        let table = self.registry.name(LogicalDatabase::Analysis);
        let analysis = self.registry.database(LogicalDatabase::Analysis)?;
        if analysis.table_record_exists(table, &Filter::eq("name", name))? {
            return Err(StoreError::RecordExists {
                table: table.to_string(),
            }
            .into());
        }

        let deployment_id =
            self.client.deployment_id(&self.config.job_name, &self.config.deployment_name)?;
        let request = RunRequest {
            name: name.to_string(),
            tags: vec![self.client.client_name().to_string()],
            parameters,
        };
        let run = self.client.create_run(&deployment_id, &request)?;
        let url = self.client.run_url(&run.id)?;

        let session_index = self.registry.query_index(LogicalDatabase::Sessions);
        let run_index = self.registry.query_index(LogicalDatabase::Analysis);
        let link_columns = vec![session_index.to_string(), run_index.to_string()];
        let link_values = vec![Scalar::text(session_id), Scalar::text(&run.id)];
        let link_filter = Filter::composite(link_columns.clone(), link_values.clone())?;
        self.registry.database(LogicalDatabase::Sessions)?.insert(
            table,
            &Row::new(link_columns, link_values)?,
            Some(&link_filter),
        )?;

        let record = RunRecord::from_run(&run, url);
        let row = Row::from_pairs([
            (run_index, Scalar::text(&run.id)),
            ("name", Scalar::text(name)),
            ("server_type", Scalar::text(SERVER_TYPE)),
            ("submitted_by", Scalar::text(submitted_by)),
            (CREATED_ON_COLUMN, Scalar::Datetime(now_utc())),
            (STATE_COLUMN, Scalar::from(record.state.clone())),
            ("start_time", Scalar::from(record.start_time.clone())),
            ("end_time", Scalar::from(record.end_time.clone())),
            ("run_time", Scalar::Real(record.run_time)),
            ("parameters", Scalar::Json(run.parameters.clone())),
            ("tags", Scalar::Json(Value::from(run.tags.clone()))),
            ("url", Scalar::text(&record.url)),
        ]);
        analysis.insert(table, &row, Some(&Filter::eq(run_index, run.id.as_str())))?;
        Ok(record)
    }

    /// Polls the server for `run_id` and stores its current state.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] with [`StoreError::UpdateNoMatch`]
    /// when the run is not tracked, and server errors otherwise.
    pub fn refresh(&self, run_id: &str) -> Result<RunRecord, OrchestratorError> {
        let run = self.client.get_run(run_id)?;
        let record = RunRecord::from_run(&run, self.client.run_url(run_id)?);
        let table = self.registry.name(LogicalDatabase::Analysis);
        let analysis = self.registry.database(LogicalDatabase::Analysis)?;
        let filter = Filter::eq(self.registry.query_index(LogicalDatabase::Analysis), run_id);
        let assignments = [
            Assignment::new(STATE_COLUMN, record.state.clone()),
            Assignment::new("start_time", record.start_time.clone()),
            Assignment::new("end_time", record.end_time.clone()),
            Assignment::new("run_time", record.run_time),
        ];
        for assignment in &assignments {
            analysis.update(table, assignment, &filter)?;
        }
        Ok(record)
    }

    /// Lists the run ids linked to `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on engine failures.
    pub fn list_runs(&self, session_id: &str) -> Result<Vec<String>, OrchestratorError> {
        let sessions = self.registry.database(LogicalDatabase::Sessions)?;
        let values = sessions
            .select_table_column_value(
                self.registry.name(LogicalDatabase::Analysis),
                self.registry.query_index(LogicalDatabase::Analysis),
                &Filter::eq(self.registry.query_index(LogicalDatabase::Sessions), session_id),
                SelectOptions::default().multi(),
            )
            .optional()?;
        Ok(values
            .map(|value| value.into_vec().iter().map(ToString::to_string).collect())
            .unwrap_or_default())
    }
}
