// crates/assemblit-store/src/session.rs
// ============================================================================
// Module: Sessions
// Description: In-memory session state and persisted session records.
// Purpose: Track selections and status messages; create and list sessions.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! [`SessionState`] is the per-client state a page render works from: who is
//! logged in, which record of each logical database is selected, and status
//! messages waiting to be shown. Messages are drained exactly once per render.
//! Cascades clear selections that point at deleted records.
//!
//! [`SessionRecords`] persists sessions: a settings row in the sessions
//! database built from field descriptors, plus a user-to-session link row in
//! the users database.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::connection::SelectOptions;
use crate::error::OptionalSelect;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::filter::Row;
use crate::hashing::generate_id;
use crate::registry::DatabaseRegistry;
use crate::registry::LogicalDatabase;
use crate::schema::Schema;
use crate::schema::parse_field_list;
use crate::tables::SETTINGS_TABLE;
use crate::value::Scalar;

// ============================================================================
// SECTION: State
// ============================================================================

/// Selected record of one logical database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Record identifier.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

/// Messages drained from a [`StatusLog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusMessages {
    /// Error messages, oldest first.
    pub errors: Vec<String>,
    /// Success messages, oldest first.
    pub successes: Vec<String>,
}

/// Pending status messages for one logical database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusLog {
    /// Pending messages.
    pending: StatusMessages,
}

impl StatusLog {
    /// Queues an error.
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.pending.errors.push(message.into());
    }

    /// Queues a success.
    pub fn push_success(&mut self, message: impl Into<String>) {
        self.pending.successes.push(message.into());
    }

    /// Takes every pending message, leaving the log empty.
    pub fn drain(&mut self) -> StatusMessages {
        std::mem::take(&mut self.pending)
    }
}

/// Logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// User identifier.
    pub user_id: String,
    /// Display name.
    pub first_name: Option<String>,
}

/// Per-client session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Logged-in user.
    user: Option<AuthenticatedUser>,
    /// Current selection per database.
    selections: BTreeMap<LogicalDatabase, Selection>,
    /// Pending messages per database.
    status: BTreeMap<LogicalDatabase, StatusLog>,
}

impl SessionState {
    /// Creates an empty, logged-out state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `user_id` as logged in and selects it in the users database.
    pub fn login(&mut self, user_id: impl Into<String>, first_name: Option<String>) {
        let user_id = user_id.into();
        self.select(LogicalDatabase::Users, user_id.clone(), first_name.clone());
        self.user = Some(AuthenticatedUser {
            user_id,
            first_name,
        });
    }

    /// Logs out and clears every selection. Pending messages are kept.
    pub fn logout(&mut self) {
        self.user = None;
        self.selections.clear();
    }

    /// Returns the logged-in user.
    #[must_use]
    pub const fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    /// Returns true when a user is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Selects a record of `database`.
    pub fn select(
        &mut self,
        database: LogicalDatabase,
        id: impl Into<String>,
        name: Option<String>,
    ) {
        self.selections.insert(
            database,
            Selection {
                id: Some(id.into()),
                name,
            },
        );
    }

    /// Returns the current selection of `database`.
    #[must_use]
    pub fn selection(&self, database: LogicalDatabase) -> Option<&Selection> {
        self.selections.get(&database)
    }

    /// Returns the selected identifier of `database`.
    #[must_use]
    pub fn selected_id(&self, database: LogicalDatabase) -> Option<&str> {
        self.selections.get(&database).and_then(|selection| selection.id.as_deref())
    }

    /// Clears the selection of `database`.
    pub fn clear_selection(&mut self, database: LogicalDatabase) {
        self.selections.remove(&database);
    }

    /// Clears the selection of `database` when it is one of `removed`.
    ///
    /// Returns true when a selection was cleared.
    pub fn clear_if_selected(&mut self, database: LogicalDatabase, removed: &[Scalar]) -> bool {
        let selected = self
            .selected_id(database)
            .is_some_and(|id| removed.iter().any(|value| value.as_text() == Some(id)));
        if selected {
            self.clear_selection(database);
        }
        selected
    }

    /// Queues an error for `database`.
    pub fn log_error(&mut self, database: LogicalDatabase, message: impl Into<String>) {
        self.status.entry(database).or_default().push_error(message);
    }

    /// Queues a success for `database`.
    pub fn log_success(&mut self, database: LogicalDatabase, message: impl Into<String>) {
        self.status.entry(database).or_default().push_success(message);
    }

    /// Drains the pending messages of `database`.
    pub fn drain_status(&mut self, database: LogicalDatabase) -> StatusMessages {
        self.status.get_mut(&database).map(StatusLog::drain).unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Persisted session records.
pub struct SessionRecords<'a> {
    /// Database registry.
    registry: &'a DatabaseRegistry,
}

impl<'a> SessionRecords<'a> {
    /// Creates the record accessor.
    #[must_use]
    pub const fn new(registry: &'a DatabaseRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Creates a session for `user_id` from a field descriptor list.
    ///
    /// The settings table is created from the descriptors on first use; later
    /// sessions must use the same field list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidField`] for malformed settings,
    /// [`StoreError::Shape`] when the field list differs from the existing
    /// table, and engine errors otherwise.
    pub fn create_session(&self, user_id: &str, settings: &Value) -> Result<String, StoreError> {
        let fields = parse_field_list(settings)?;
        let session_index = self.registry.query_index(LogicalDatabase::Sessions);
        let user_index = self.registry.query_index(LogicalDatabase::Users);
        let schema = Schema::from_fields(SETTINGS_TABLE, &fields, Some(session_index))?;
        let sessions = self.registry.database(LogicalDatabase::Sessions)?;
        sessions.create_table(SETTINGS_TABLE, &schema)?;

        let session_id = generate_id(user_id);
        let mut pairs = vec![(session_index.to_string(), Scalar::text(&session_id))];
        pairs.extend(fields.iter().map(|field| {
            (field.parameter.clone(), field.value.clone().unwrap_or(Scalar::Null))
        }));
        sessions.insert(
            SETTINGS_TABLE,
            &Row::from_pairs(pairs),
            Some(&Filter::eq(session_index, session_id.as_str())),
        )?;

        let link = Row::from_pairs([
            (user_index, Scalar::text(user_id)),
            (session_index, Scalar::text(&session_id)),
        ]);
        self.registry.database(LogicalDatabase::Users)?.insert(
            self.registry.name(LogicalDatabase::Sessions),
            &link,
            None,
        )?;
        Ok(session_id)
    }

    /// Lists the session identifiers linked to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on engine failures.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let users = self.registry.database(LogicalDatabase::Users)?;
        let values = users
            .select_table_column_value(
                self.registry.name(LogicalDatabase::Sessions),
                self.registry.query_index(LogicalDatabase::Sessions),
                &Filter::eq(self.registry.query_index(LogicalDatabase::Users), user_id),
                SelectOptions::default().multi(),
            )
            .optional()?;
        Ok(values
            .map(|value| value.into_vec().iter().map(ToString::to_string).collect())
            .unwrap_or_default())
    }

    /// Returns the stored settings of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NullReturnValue`] for unknown sessions.
    pub fn settings(&self, session_id: &str) -> Result<Row, StoreError> {
        let sessions = self.registry.database(LogicalDatabase::Sessions)?;
        let columns = sessions.select_table_column_names_as_list(SETTINGS_TABLE)?;
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        sessions.select_multi_table_column_value(
            SETTINGS_TABLE,
            &columns,
            &Filter::eq(self.registry.query_index(LogicalDatabase::Sessions), session_id),
        )
    }
}
