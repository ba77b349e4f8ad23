// crates/assemblit-store/src/registry.rs
// ============================================================================
// Module: Database Registry
// Description: Lazily opened handles for the four logical databases.
// Purpose: Replace global per-name connection state with an explicit registry.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The application keeps four independent database files: users, sessions,
//! data, and analysis. Each has a configured file name and a query index, the
//! column that identifies its records and links it to its parent. The
//! registry opens each file on first use and hands out shared references for
//! the lifetime of the process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Deserialize;
use serde::Serialize;

use crate::connection::Database;
use crate::connection::DatabaseConfig;
use crate::connection::SqliteJournalMode;
use crate::connection::SqliteSyncMode;
use crate::connection::DEFAULT_BUSY_TIMEOUT_MS;
use crate::error::StoreError;
use crate::tables;

// ============================================================================
// SECTION: Logical Databases
// ============================================================================

/// The four application databases, in dependency order (root first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalDatabase {
    /// Credentials and user-to-session links.
    Users,
    /// Session settings and session-to-dataset/run links.
    Sessions,
    /// Dataset metadata and one table per dataset.
    Data,
    /// Submitted analysis runs.
    Analysis,
}

impl LogicalDatabase {
    /// All databases, root first.
    pub const ALL: [Self; 4] = [Self::Users, Self::Sessions, Self::Data, Self::Analysis];

    /// Returns the label used in logs and config.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Sessions => "sessions",
            Self::Data => "data",
            Self::Analysis => "analysis",
        }
    }

    /// Returns the default query index column.
    #[must_use]
    pub const fn default_query_index(self) -> &'static str {
        match self {
            Self::Users => "user_id",
            Self::Sessions => "session_id",
            Self::Data => "dataset_id",
            Self::Analysis => "run_id",
        }
    }

    /// Returns the array index used for per-database slots.
    const fn slot(self) -> usize {
        match self {
            Self::Users => 0,
            Self::Sessions => 1,
            Self::Data => 2,
            Self::Analysis => 3,
        }
    }
}

impl fmt::Display for LogicalDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Name and query index of one logical database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseSettings {
    /// Database (file) name.
    pub name: String,
    /// Column identifying records of this database.
    pub query_index: String,
}

impl DatabaseSettings {
    /// Returns the default settings for `database`.
    #[must_use]
    pub fn default_for(database: LogicalDatabase) -> Self {
        Self {
            name: database.as_str().to_string(),
            query_index: database.default_query_index().to_string(),
        }
    }
}

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Directory holding every database file.
    pub dir: PathBuf,
    /// Users database.
    pub users: DatabaseSettings,
    /// Sessions database.
    pub sessions: DatabaseSettings,
    /// Data database.
    pub data: DatabaseSettings,
    /// Analysis database.
    pub analysis: DatabaseSettings,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    pub sync_mode: SqliteSyncMode,
}

impl RegistryConfig {
    /// Default layout rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            users: DatabaseSettings::default_for(LogicalDatabase::Users),
            sessions: DatabaseSettings::default_for(LogicalDatabase::Sessions),
            data: DatabaseSettings::default_for(LogicalDatabase::Data),
            analysis: DatabaseSettings::default_for(LogicalDatabase::Analysis),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }

    /// Returns the settings of `database`.
    #[must_use]
    pub const fn settings(&self, database: LogicalDatabase) -> &DatabaseSettings {
        match database {
            LogicalDatabase::Users => &self.users,
            LogicalDatabase::Sessions => &self.sessions,
            LogicalDatabase::Data => &self.data,
            LogicalDatabase::Analysis => &self.analysis,
        }
    }

    /// Builds the connection config of `database`.
    #[must_use]
    pub fn database_config(&self, database: LogicalDatabase) -> DatabaseConfig {
        DatabaseConfig {
            dir: self.dir.clone(),
            name: self.settings(database).name.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Process-wide handles to the four logical databases.
///
/// # Invariants
/// - At most one [`Database`] is opened per logical database.
pub struct DatabaseRegistry {
    /// Registry configuration.
    config: RegistryConfig,
    /// Lazily opened handles, indexed by [`LogicalDatabase::slot`].
    handles: [OnceLock<Database>; 4],
}

impl DatabaseRegistry {
    /// Creates a registry; no file is opened yet.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            handles: [OnceLock::new(), OnceLock::new(), OnceLock::new(), OnceLock::new()],
        }
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the query index column of `database`.
    #[must_use]
    pub fn query_index(&self, database: LogicalDatabase) -> &str {
        &self.config.settings(database).query_index
    }

    /// Returns the configured name of `database`.
    #[must_use]
    pub fn name(&self, database: LogicalDatabase) -> &str {
        &self.config.settings(database).name
    }

    /// Returns the handle for `database`, opening it on first use.
    ///
    /// Concurrent first calls all return the same handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be opened.
    pub fn database(&self, database: LogicalDatabase) -> Result<&Database, StoreError> {
        let cell = &self.handles[database.slot()];
        if let Some(handle) = cell.get() {
            return Ok(handle);
        }
        let opened = Database::open(self.config.database_config(database))?;
        // A thread that loses the race to store its handle closes it here and
        // shares the winner's.
        let _ = cell.set(opened);
        cell.get().ok_or_else(|| StoreError::Db(format!("{database} handle unavailable")))
    }

    /// Creates every built-in table; existing tables are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failing create.
    pub fn initialize(&self) -> Result<(), StoreError> {
        for (database, schema) in tables::builtin_schemas(&self.config)? {
            self.database(database)?.create_table(schema.name(), &schema)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_database_labels() {
        let config = RegistryConfig::new("db");
        assert_eq!(config.settings(LogicalDatabase::Data).name, "data");
        assert_eq!(config.settings(LogicalDatabase::Analysis).query_index, "run_id");
        let connection = config.database_config(LogicalDatabase::Users);
        assert_eq!(connection.name, "users");
        assert_eq!(connection.dir, PathBuf::from("db"));
    }

    #[test]
    fn databases_are_ordered_root_first() {
        let mut shuffled =
            vec![LogicalDatabase::Analysis, LogicalDatabase::Users, LogicalDatabase::Data];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![LogicalDatabase::Users, LogicalDatabase::Data, LogicalDatabase::Analysis]
        );
    }
}
