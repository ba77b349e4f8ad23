// crates/assemblit-store/src/connection.rs
// ============================================================================
// Module: Database Connection
// Description: One sqlite database file with table, row, and query operations.
// Purpose: Execute every persistence operation against a single file.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! [`Database`] owns a long-lived read handle to one file. Reads go through
//! that handle behind a mutex. Every mutation opens a short-lived write
//! handle, runs inside one transaction, commits, and drops the handle. The
//! engine is single-writer: a write refused because another writer holds the
//! lock surfaces as [`StoreError::Db`] once the configured busy timeout
//! elapses. There is no retry loop.
//!
//! Values are always bound as parameters. Identifiers are validated and
//! double-quoted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::iter;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::Transaction;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use serde::Serialize;

use crate::error::StoreError;
use crate::filter::Assignment;
use crate::filter::Filter;
use crate::filter::Row;
use crate::plan::DeletionPlan;
use crate::plan::PurgeSummary;
use crate::plan::TableCount;
use crate::schema::Schema;
use crate::sql::checked_identifier;
use crate::sql::placeholders;
use crate::value::ReturnType;
use crate::value::Scalar;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// File extensions accepted for database files.
pub const SUPPORTED_EXTENSIONS: [&str; 7] =
    ["db", "sdb", "sqlite", "db3", "s3db", "sqlite3", "sl3"];
/// Extension used when the configured one is not supported.
pub const DEFAULT_EXTENSION: &str = "db";
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for one database file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Directory holding the database file (created if absent).
    pub dir: PathBuf,
    /// Database name, with or without a supported extension.
    pub name: String,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl DatabaseConfig {
    /// Creates a config with default pragmas.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Normalizes a database name to carry a supported extension.
///
/// A supported extension is kept and lower-cased. Anything else is replaced
/// by [`DEFAULT_EXTENSION`].
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for empty names or names with path
/// separators.
pub fn parse_db_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
        return Err(StoreError::Invalid(format!("invalid database name: {name}")));
    }
    let path = Path::new(trimmed);
    let stem = path
        .file_stem()
        .map_or_else(|| trimmed.to_string(), |s| s.to_string_lossy().into_owned());
    let extension = path.extension().map(|ext| ext.to_string_lossy().to_lowercase());
    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(format!("{stem}.{ext}")),
        _ => Ok(format!("{stem}.{DEFAULT_EXTENSION}")),
    }
}

// ============================================================================
// SECTION: Select Options
// ============================================================================

/// Sort direction for multi-value selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Options for [`Database::select_table_column_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    /// Coercion applied to each value.
    pub return_type: ReturnType,
    /// Whether several rows are acceptable.
    pub multi: bool,
    /// Sort direction of the selected column.
    pub order: SortOrder,
    /// `true` selects matches (`IN`), `false` selects non-matches (`NOT IN`).
    pub contains: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            return_type: ReturnType::Text,
            multi: false,
            order: SortOrder::Asc,
            contains: true,
        }
    }
}

impl SelectOptions {
    /// Single value coerced to `return_type`.
    #[must_use]
    pub fn returning(return_type: ReturnType) -> Self {
        Self {
            return_type,
            ..Self::default()
        }
    }

    /// Accepts several rows.
    #[must_use]
    pub const fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Sorts descending.
    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.order = SortOrder::Desc;
        self
    }

    /// Selects rows that do not match the filter.
    #[must_use]
    pub const fn excluding(mut self) -> Self {
        self.contains = false;
        self
    }
}

/// Value returned by a column select.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Exactly one row, single-value select.
    One(Scalar),
    /// Multi-value select, in query order.
    Many(Vec<Scalar>),
}

impl QueryValue {
    /// Returns the values as a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<Scalar> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }

    /// Returns the single value, if this is one.
    #[must_use]
    pub fn into_one(self) -> Option<Scalar> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// Handle to one sqlite database file.
///
/// # Invariants
/// - `path` is `dir/parse_db_name(name)` and its directory exists.
/// - The read handle is only used for queries; writes use fresh handles.
pub struct Database {
    /// Database configuration.
    config: DatabaseConfig,
    /// Resolved file path.
    path: PathBuf,
    /// Normalized file name.
    file_name: String,
    /// Long-lived read handle.
    reader: Mutex<Connection>,
}

impl Database {
    /// Opens (and creates if needed) the database file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the directory or file cannot be created or
    /// the name is invalid.
    pub fn open(config: DatabaseConfig) -> Result<Self, StoreError> {
        let file_name = parse_db_name(&config.name)?;
        let path = config.dir.join(&file_name);
        validate_store_path(&path)?;
        std::fs::create_dir_all(&config.dir).map_err(|err| StoreError::Io(err.to_string()))?;
        let reader = open_connection(&path, &config)?;
        Ok(Self {
            config,
            path,
            file_name,
            reader: Mutex::new(reader),
        })
    }

    /// Returns the database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the normalized file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the configured (unnormalized) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    // ------------------------------------------------------------------------
    // Table lifecycle
    // ------------------------------------------------------------------------

    /// Creates `name` from `schema`; a no-op when the table exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid names or engine failures.
    pub fn create_table(&self, name: &str, schema: &Schema) -> Result<(), StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} {}",
            checked_identifier(name)?,
            schema.compile_ddl()
        );
        self.write(|tx| tx.execute_batch(&sql).map_err(|err| StoreError::Db(err.to_string())))
    }

    /// Drops `name`; a no-op when the table is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid names or engine failures.
    pub fn drop_table(&self, name: &str) -> Result<(), StoreError> {
        let sql = format!("DROP TABLE IF EXISTS {}", checked_identifier(name)?);
        self.write(|tx| tx.execute_batch(&sql).map_err(|err| StoreError::Db(err.to_string())))
    }

    /// Returns true when a table called `name` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on engine failures.
    pub fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        self.read(|conn| table_exists_on(conn, name))
    }

    /// Returns true when any row of `name` matches `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid filters or engine failures.
    pub fn table_record_exists(&self, name: &str, filter: &Filter) -> Result<bool, StoreError> {
        let rendered = filter.render(false)?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {})",
            checked_identifier(name)?,
            rendered.clause
        );
        let exists: i64 = self.read(|conn| {
            conn.query_row(&sql, params_from_iter(rendered.params.iter()), |row| row.get(0))
                .map_err(|err| StoreError::Db(err.to_string()))
        })?;
        Ok(exists != 0)
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Inserts one row.
    ///
    /// With `validate`, a row matching that filter must not already exist.
    /// The row's columns must equal the live column order exactly.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the table does not exist,
    /// [`StoreError::Shape`] on column mismatch, [`StoreError::RecordExists`]
    /// when validation finds a match, and [`StoreError::Db`] on constraint or
    /// engine failures.
    pub fn insert(
        &self,
        name: &str,
        row: &Row,
        validate: Option<&Filter>,
    ) -> Result<(), StoreError> {
        self.ensure_row_shape(name, row.columns())?;
        if let Some(filter) = validate
            && self.table_record_exists(name, filter)?
        {
            return Err(StoreError::RecordExists {
                table: name.to_string(),
            });
        }
        let sql = insert_sql(name, row.columns())?;
        self.write(|tx| {
            tx.execute(&sql, params_from_iter(row.values().iter()))
                .map(|_| ())
                .map_err(|err| StoreError::Db(err.to_string()))
        })
    }

    /// Inserts many rows sharing one column list, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Shape`] on column mismatch, [`StoreError::Invalid`]
    /// when a row has the wrong arity, and [`StoreError::Db`] on engine failures.
    pub fn insert_many(
        &self,
        name: &str,
        columns: &[String],
        rows: &[Vec<Scalar>],
    ) -> Result<usize, StoreError> {
        self.ensure_row_shape(name, columns)?;
        if let Some(index) = rows.iter().position(|values| values.len() != columns.len()) {
            return Err(StoreError::Invalid(format!(
                "row {index} has {} values, expected {}",
                rows[index].len(),
                columns.len()
            )));
        }
        let sql = insert_sql(name, columns)?;
        self.write(|tx| {
            let mut stmt = tx.prepare(&sql).map_err(|err| StoreError::Db(err.to_string()))?;
            for values in rows {
                stmt.execute(params_from_iter(values.iter()))
                    .map_err(|err| StoreError::Db(err.to_string()))?;
            }
            Ok(rows.len())
        })
    }

    /// Updates one column of the single row matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UpdateNoMatch`] when nothing matches and
    /// [`StoreError::UpdateAmbiguous`] when more than one row matches; no row
    /// is modified in either case.
    pub fn update(
        &self,
        name: &str,
        value: &Assignment,
        filter: &Filter,
    ) -> Result<(), StoreError> {
        let table = checked_identifier(name)?;
        let column = checked_identifier(&value.column)?;
        let rendered = filter.render(false)?;
        let count_sql = format!("SELECT COUNT(*) FROM {table} WHERE {}", rendered.clause);
        let update_sql = format!("UPDATE {table} SET {column} = ? WHERE {}", rendered.clause);
        self.write(|tx| {
            let matched: i64 = tx
                .query_row(&count_sql, params_from_iter(rendered.params.iter()), |row| row.get(0))
                .map_err(|err| StoreError::Db(err.to_string()))?;
            match matched {
                0 => Err(StoreError::UpdateNoMatch {
                    table: name.to_string(),
                }),
                1 => tx
                    .execute(
                        &update_sql,
                        params_from_iter(iter::once(&value.value).chain(rendered.params.iter())),
                    )
                    .map(|_| ())
                    .map_err(|err| StoreError::Db(err.to_string())),
                count => Err(StoreError::UpdateAmbiguous {
                    table: name.to_string(),
                    matched: count_to_u64(count),
                }),
            }
        })
    }

    /// Sets a column on every matching row (all rows without a filter).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid names or engine failures.
    pub fn reset_table_column_value(
        &self,
        name: &str,
        value: &Assignment,
        filter: Option<&Filter>,
    ) -> Result<usize, StoreError> {
        let table = checked_identifier(name)?;
        let column = checked_identifier(&value.column)?;
        let rendered = filter.map(|filter| filter.render(false)).transpose()?;
        let (clause, params) = match rendered {
            Some(rendered) => (format!(" WHERE {}", rendered.clause), rendered.params),
            None => (String::new(), Vec::new()),
        };
        let sql = format!("UPDATE {table} SET {column} = ?{clause}");
        self.write(|tx| {
            tx.execute(&sql, params_from_iter(iter::once(&value.value).chain(params.iter())))
                .map_err(|err| StoreError::Db(err.to_string()))
        })
    }

    /// Deletes every row matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid names or engine failures.
    pub fn delete_table_column_value(
        &self,
        name: &str,
        filter: &Filter,
    ) -> Result<usize, StoreError> {
        let sql = delete_sql(name, filter)?;
        self.write(|tx| {
            tx.execute(&sql.0, params_from_iter(sql.1.iter()))
                .map_err(|err| StoreError::Db(err.to_string()))
        })
    }

    /// Executes a deletion plan in order, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failing entry; nothing is deleted.
    pub fn delete(&self, plan: &DeletionPlan) -> Result<usize, StoreError> {
        self.purge(&[], plan).map(|summary| summary.deleted_rows())
    }

    /// Drops tables, then executes a plan, in one transaction.
    ///
    /// Tables that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on the first failure; the transaction rolls back.
    pub fn purge(&self, drops: &[String], plan: &DeletionPlan) -> Result<PurgeSummary, StoreError> {
        let statements: Vec<(String, Vec<Scalar>)> = plan
            .entries()
            .iter()
            .map(|entry| delete_sql(&entry.table, &entry.filter))
            .collect::<Result<_, _>>()?;
        self.write(|tx| {
            let mut summary = PurgeSummary::default();
            for table in drops {
                if !table_exists_on(tx, table)? {
                    continue;
                }
                let quoted = checked_identifier(table)?;
                let rows: i64 = tx
                    .query_row(&format!("SELECT COUNT(*) FROM {quoted}"), [], |row| row.get(0))
                    .map_err(|err| StoreError::Db(err.to_string()))?;
                tx.execute_batch(&format!("DROP TABLE {quoted}"))
                    .map_err(|err| StoreError::Db(err.to_string()))?;
                summary.dropped.push(TableCount {
                    table: table.clone(),
                    rows: usize::try_from(rows).unwrap_or(0),
                });
            }
            for (entry, (sql, params)) in plan.entries().iter().zip(&statements) {
                let rows = tx
                    .execute(sql, params_from_iter(params.iter()))
                    .map_err(|err| StoreError::Db(err.to_string()))?;
                summary.deleted.push(TableCount {
                    table: entry.table.clone(),
                    rows,
                });
            }
            Ok(summary)
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Selects `column` from rows matching `filter`.
    ///
    /// Scalar filters are normalized to one-element sets. One row yields
    /// [`QueryValue::One`] (or a one-element [`QueryValue::Many`] when
    /// `multi`); several rows need `multi` and come back in `ORDER BY` order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NullReturnValue`] when nothing matches,
    /// [`StoreError::AmbiguousResult`] for several rows without `multi`, and
    /// [`StoreError::Coercion`] when a value cannot be converted.
    pub fn select_table_column_value(
        &self,
        name: &str,
        column: &str,
        filter: &Filter,
        options: SelectOptions,
    ) -> Result<QueryValue, StoreError> {
        let filter = filter.clone().into_set();
        let rendered = filter.render(!options.contains)?;
        let quoted = checked_identifier(column)?;
        let sql = format!(
            "SELECT {quoted} FROM {} WHERE {} ORDER BY {quoted} {}",
            checked_identifier(name)?,
            rendered.clause,
            options.order.keyword()
        );
        let values = self.read(|conn| collect_column(conn, &sql, &rendered.params))?;
        let coerce = |values: Vec<Scalar>| -> Result<Vec<Scalar>, StoreError> {
            values.into_iter().map(|value| options.return_type.coerce(value)).collect()
        };
        match values.len() {
            0 => Err(StoreError::NullReturnValue {
                query: sql,
            }),
            _ if options.multi => Ok(QueryValue::Many(coerce(values)?)),
            1 => {
                let value = values.into_iter().next().unwrap_or(Scalar::Null);
                Ok(QueryValue::One(options.return_type.coerce(value)?))
            }
            _ => Err(StoreError::AmbiguousResult {
                query: sql,
            }),
        }
    }

    /// Selects several columns of the first row matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NullReturnValue`] when nothing matches.
    pub fn select_multi_table_column_value(
        &self,
        name: &str,
        columns: &[&str],
        filter: &Filter,
    ) -> Result<Row, StoreError> {
        let quoted: Vec<String> =
            columns.iter().map(|column| checked_identifier(column)).collect::<Result<_, _>>()?;
        let rendered = filter.render(false)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            quoted.join(", "),
            checked_identifier(name)?,
            rendered.clause
        );
        let first = self.read(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(|err| StoreError::Db(err.to_string()))?;
            let mut rows = stmt
                .query(params_from_iter(rendered.params.iter()))
                .map_err(|err| StoreError::Db(err.to_string()))?;
            let Some(row) = rows.next().map_err(|err| StoreError::Db(err.to_string()))? else {
                return Ok(None);
            };
            let values = (0 .. columns.len())
                .map(|index| row.get_ref(index).map(Scalar::from_value_ref))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| StoreError::Db(err.to_string()))?;
            Ok(Some(values))
        })?;
        let Some(values) = first else {
            return Err(StoreError::NullReturnValue {
                query: sql,
            });
        };
        Row::new(columns.iter().map(|column| (*column).to_string()).collect(), values)
    }

    /// Runs an arbitrary read-only query that must yield exactly one value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for statements that write,
    /// [`StoreError::NullReturnValue`] for no rows, and
    /// [`StoreError::AmbiguousResult`] for several rows.
    pub fn select_generic_query(
        &self,
        sql: &str,
        return_type: ReturnType,
    ) -> Result<Scalar, StoreError> {
        let values = self.read(|conn| {
            let stmt = conn.prepare(sql).map_err(|err| StoreError::Db(err.to_string()))?;
            if !stmt.readonly() {
                return Err(StoreError::Invalid("generic queries must be read-only".to_string()));
            }
            drop(stmt);
            collect_column(conn, sql, &[])
        })?;
        match values.len() {
            0 => Err(StoreError::NullReturnValue {
                query: sql.to_string(),
            }),
            1 => return_type.coerce(values.into_iter().next().unwrap_or(Scalar::Null)),
            _ => Err(StoreError::AmbiguousResult {
                query: sql.to_string(),
            }),
        }
    }

    /// Lists tables that have a column called `column`, by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on engine failures.
    pub fn select_all_tables_with_column_name(
        &self,
        column: &str,
    ) -> Result<Vec<String>, StoreError> {
        self.read(|conn| {
            collect_strings(
                conn,
                "SELECT m.name FROM sqlite_master AS m JOIN pragma_table_info(m.name) AS p WHERE \
                 m.type = 'table' AND p.name = ?1 ORDER BY m.name",
                column,
            )
        })
    }

    /// Returns the live column order of `name` (empty when absent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on engine failures.
    pub fn select_table_column_names_as_list(&self, name: &str) -> Result<Vec<String>, StoreError> {
        self.read(|conn| {
            collect_strings(conn, "SELECT name FROM pragma_table_info(?1) ORDER BY cid", name)
        })
    }

    /// Counts rows of `name`, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid filters or engine failures.
    pub fn select_num_table_records(
        &self,
        name: &str,
        filter: Option<&Filter>,
    ) -> Result<u64, StoreError> {
        let rendered = filter.map(|filter| filter.render(false)).transpose()?;
        let (clause, params) = match rendered {
            Some(rendered) => (format!(" WHERE {}", rendered.clause), rendered.params),
            None => (String::new(), Vec::new()),
        };
        let sql = format!("SELECT COUNT(*) FROM {}{clause}", checked_identifier(name)?);
        let count: i64 = self.read(|conn| {
            conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
                .map_err(|err| StoreError::Db(err.to_string()))
        })?;
        Ok(count_to_u64(count))
    }

    /// Lists user tables by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Db`] on engine failures.
    pub fn select_table_names(&self) -> Result<Vec<String>, StoreError> {
        self.read(|conn| {
            collect_strings(
                conn,
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE ?1 ORDER BY \
                 name",
                "sqlite_%",
            )
        })
    }

    /// Collects the first column of an internal read query.
    pub(crate) fn select_column(
        &self,
        sql: &str,
        params: &[Scalar],
    ) -> Result<Vec<Scalar>, StoreError> {
        self.read(|conn| collect_column(conn, sql, params))
    }

    // ------------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------------

    /// Runs `query` on the long-lived read handle.
    fn read<T>(
        &self,
        query: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let guard =
            self.reader.lock().map_err(|_| StoreError::Db("mutex poisoned".to_string()))?;
        query(&guard)
    }

    /// Runs `mutation` in a transaction on a fresh write handle.
    fn write<T>(
        &self,
        mutation: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut connection = open_connection(&self.path, &self.config)?;
        let tx = connection.transaction().map_err(|err| StoreError::Db(err.to_string()))?;
        let output = mutation(&tx)?;
        tx.commit().map_err(|err| StoreError::Db(err.to_string()))?;
        Ok(output)
    }

    /// Checks `columns` against the live column order of `name`.
    fn ensure_row_shape(&self, name: &str, columns: &[String]) -> Result<(), StoreError> {
        let expected = self.select_table_column_names_as_list(name)?;
        if expected.is_empty() {
            return Err(StoreError::Invalid(format!(
                "table {name} does not exist in {}",
                self.file_name
            )));
        }
        if columns != expected.as_slice() {
            return Err(StoreError::Shape {
                table: name.to_string(),
                database: self.file_name.clone(),
                expected,
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates the database path against length limits.
fn validate_store_path(path: &Path) -> Result<(), StoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(StoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(StoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(StoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens a handle with the configured pragmas.
fn open_connection(path: &Path, config: &DatabaseConfig) -> Result<Connection, StoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(path, flags).map_err(|err| StoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout settings.
fn apply_pragmas(connection: &Connection, config: &DatabaseConfig) -> Result<(), StoreError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(())
}

/// Checks the catalog for a table on an arbitrary handle.
fn table_exists_on(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .map_err(|err| StoreError::Db(err.to_string()))?;
    Ok(count > 0)
}

/// Builds an INSERT statement for `columns`.
fn insert_sql(name: &str, columns: &[String]) -> Result<String, StoreError> {
    let quoted: Vec<String> =
        columns.iter().map(|column| checked_identifier(column)).collect::<Result<_, _>>()?;
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        checked_identifier(name)?,
        quoted.join(", "),
        placeholders(columns.len())
    ))
}

/// Builds a DELETE statement and its parameters.
fn delete_sql(name: &str, filter: &Filter) -> Result<(String, Vec<Scalar>), StoreError> {
    let rendered = filter.render(false)?;
    Ok((
        format!("DELETE FROM {} WHERE {}", checked_identifier(name)?, rendered.clause),
        rendered.params,
    ))
}

/// Collects the first column of every row.
fn collect_column(
    conn: &Connection,
    sql: &str,
    params: &[Scalar],
) -> Result<Vec<Scalar>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(|err| StoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            row.get_ref(0).map(Scalar::from_value_ref)
        })
        .map_err(|err| StoreError::Db(err.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| StoreError::Db(err.to_string()))
}

/// Collects a text column from a one-parameter query.
fn collect_strings(conn: &Connection, sql: &str, param: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(|err| StoreError::Db(err.to_string()))?;
    let rows = stmt
        .query_map(params![param], |row| row.get::<_, String>(0))
        .map_err(|err| StoreError::Db(err.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| StoreError::Db(err.to_string()))
}

/// Converts an engine count to `u64`.
fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn db_names_normalize_extensions() {
        assert_eq!(parse_db_name("users").unwrap(), "users.db");
        assert_eq!(parse_db_name("Users.SQLite").unwrap(), "Users.sqlite");
        assert_eq!(parse_db_name("data.s3db").unwrap(), "data.s3db");
        assert_eq!(parse_db_name("analysis.txt").unwrap(), "analysis.db");
        assert!(parse_db_name("").is_err());
        assert!(parse_db_name("../users").is_err());
    }

    #[test]
    fn select_options_compose() {
        let options =
            SelectOptions::returning(ReturnType::Integer).multi().descending().excluding();
        assert_eq!(options.return_type, ReturnType::Integer);
        assert!(options.multi);
        assert_eq!(options.order, SortOrder::Desc);
        assert!(!options.contains);
    }

    #[test]
    fn query_value_flattens() {
        assert_eq!(QueryValue::One(Scalar::Integer(1)).into_vec(), vec![Scalar::Integer(1)]);
        assert_eq!(QueryValue::Many(Vec::new()).into_one(), None);
    }
}
