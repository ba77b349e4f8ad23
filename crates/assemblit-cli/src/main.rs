// crates/assemblit-cli/src/main.rs
// ============================================================================
// Module: Assemblit CLI Entry Point
// Description: Command dispatcher for accounts, sessions, datasets, and runs.
// Purpose: Drive the persistence layer and cascade engine from a shell.
// Dependencies: clap, assemblit-auth, assemblit-config, assemblit-orchestrator,
// assemblit-store, serde, thiserror.
// ============================================================================

//! ## Overview
//! The Assemblit CLI opens the four databases named by the configuration and
//! runs one operation per invocation: account management, session and
//! dataset lifecycle, table inspection, and orchestration run tracking.
//! Results are printed as pretty JSON on stdout; errors go to stderr with a
//! failure exit code.
//!
//! Security posture: file inputs are untrusted and read with hard size
//! limits; deletions always go through the cascade engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use assemblit_auth::Vault;
use assemblit_config::AssemblitConfig;
use assemblit_config::AuditConfig;
use assemblit_config::AuditSinkKind;
use assemblit_config::config_yaml_example;
use assemblit_orchestrator::OrchestratorClient;
use assemblit_orchestrator::RunTracker;
use assemblit_store::CascadeOrchestrator;
use assemblit_store::CascadeReport;
use assemblit_store::DatabaseRegistry;
use assemblit_store::DatasetIngestor;
use assemblit_store::DatasetUpload;
use assemblit_store::FileAuditSink;
use assemblit_store::LogicalDatabase;
use assemblit_store::NoopAuditSink;
use assemblit_store::ReturnType;
use assemblit_store::Scalar;
use assemblit_store::SessionRecords;
use assemblit_store::SessionState;
use assemblit_store::StderrAuditSink;
use assemblit_store::StoreAuditSink;
use assemblit_store::StoreError;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a dataset upload file.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
/// Maximum size of a settings or parameters file.
const MAX_SETTINGS_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "assemblit", version, disable_help_subcommand = true)]
struct Cli {
    /// Optional config file path (defaults to `.assemblit/config.yaml` or
    /// `ASSEMBLIT_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database files and built-in tables.
    Init,
    /// Account management.
    User {
        /// Selected user subcommand.
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Session lifecycle.
    Session {
        /// Selected session subcommand.
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Dataset lifecycle.
    Dataset {
        /// Selected dataset subcommand.
        #[command(subcommand)]
        command: DatasetCommand,
    },
    /// Table inspection.
    Db {
        /// Selected database subcommand.
        #[command(subcommand)]
        command: DbCommand,
    },
    /// Orchestration run tracking.
    Run {
        /// Selected run subcommand.
        #[command(subcommand)]
        command: RunCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Account subcommands.
#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create an account.
    Add(UserAddCommand),
    /// Verify credentials.
    Login(UserLoginCommand),
    /// Change a password.
    Passwd(UserPasswdCommand),
    /// Change a username.
    Rename(UserRenameCommand),
    /// Delete an account and everything only it references.
    Delete(UserDeleteCommand),
}

/// Arguments for `user add`.
#[derive(Args, Debug)]
struct UserAddCommand {
    /// Email-shaped username.
    #[arg(long, value_name = "EMAIL")]
    username: String,
    /// Account password.
    #[arg(long, value_name = "PASSWORD")]
    password: String,
    /// Optional first name.
    #[arg(long, value_name = "NAME")]
    first_name: Option<String>,
}

/// Arguments for `user login`.
#[derive(Args, Debug)]
struct UserLoginCommand {
    /// Email-shaped username.
    #[arg(long, value_name = "EMAIL")]
    username: String,
    /// Account password.
    #[arg(long, value_name = "PASSWORD")]
    password: String,
}

/// Arguments for `user passwd`.
#[derive(Args, Debug)]
struct UserPasswdCommand {
    /// Account identifier.
    #[arg(long, value_name = "ID")]
    user_id: String,
    /// Current password.
    #[arg(long, value_name = "PASSWORD")]
    current: String,
    /// New password.
    #[arg(long, value_name = "PASSWORD")]
    password: String,
}

/// Arguments for `user rename`.
#[derive(Args, Debug)]
struct UserRenameCommand {
    /// Account identifier.
    #[arg(long, value_name = "ID")]
    user_id: String,
    /// New email-shaped username.
    #[arg(long, value_name = "EMAIL")]
    username: String,
}

/// Arguments for `user delete`.
#[derive(Args, Debug)]
struct UserDeleteCommand {
    /// Account identifier.
    #[arg(long, value_name = "ID")]
    user_id: String,
    /// Account password.
    #[arg(long, value_name = "PASSWORD")]
    password: String,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Create a session from a settings file.
    Create(SessionCreateCommand),
    /// List the sessions of a user.
    List(SessionListCommand),
    /// Delete a session and its datasets and runs.
    Delete(SessionDeleteCommand),
}

/// Arguments for `session create`.
#[derive(Args, Debug)]
struct SessionCreateCommand {
    /// Owning user identifier.
    #[arg(long, value_name = "ID")]
    user_id: String,
    /// JSON file holding the settings descriptor list.
    #[arg(long, value_name = "PATH")]
    settings: PathBuf,
}

/// Arguments for `session list`.
#[derive(Args, Debug)]
struct SessionListCommand {
    /// Owning user identifier.
    #[arg(long, value_name = "ID")]
    user_id: String,
}

/// Arguments for `session delete`.
#[derive(Args, Debug)]
struct SessionDeleteCommand {
    /// Session identifier.
    #[arg(long, value_name = "ID")]
    session_id: String,
}

/// Dataset subcommands.
#[derive(Subcommand, Debug)]
enum DatasetCommand {
    /// Ingest a JSON upload into a session.
    Ingest(DatasetIngestCommand),
    /// Delete a dataset.
    Delete(DatasetDeleteCommand),
}

/// Arguments for `dataset ingest`.
#[derive(Args, Debug)]
struct DatasetIngestCommand {
    /// Owning session identifier.
    #[arg(long, value_name = "ID")]
    session_id: String,
    /// Uploading user identifier.
    #[arg(long, value_name = "ID")]
    user_id: String,
    /// JSON upload file (`file_name`, `columns`, `rows`).
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
}

/// Arguments for `dataset delete`.
#[derive(Args, Debug)]
struct DatasetDeleteCommand {
    /// Dataset identifier.
    #[arg(long, value_name = "ID")]
    dataset_id: String,
}

/// Database inspection subcommands.
#[derive(Subcommand, Debug)]
enum DbCommand {
    /// List the tables of a database.
    Tables(DbTablesCommand),
    /// Count the rows of a table.
    Count(DbCountCommand),
    /// Run a read-only query returning one value.
    Query(DbQueryCommand),
}

/// Logical database selection.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DatabaseArg {
    /// Credentials and user links.
    Users,
    /// Session settings and dataset links.
    Sessions,
    /// Dataset tables.
    Data,
    /// Run records.
    Analysis,
}

impl From<DatabaseArg> for LogicalDatabase {
    fn from(value: DatabaseArg) -> Self {
        match value {
            DatabaseArg::Users => Self::Users,
            DatabaseArg::Sessions => Self::Sessions,
            DatabaseArg::Data => Self::Data,
            DatabaseArg::Analysis => Self::Analysis,
        }
    }
}

/// Arguments for `db tables`.
#[derive(Args, Debug)]
struct DbTablesCommand {
    /// Database to inspect.
    #[arg(long, value_enum, value_name = "DATABASE")]
    database: DatabaseArg,
}

/// Arguments for `db count`.
#[derive(Args, Debug)]
struct DbCountCommand {
    /// Database holding the table.
    #[arg(long, value_enum, value_name = "DATABASE")]
    database: DatabaseArg,
    /// Table name.
    #[arg(long, value_name = "TABLE")]
    table: String,
}

/// Arguments for `db query`.
#[derive(Args, Debug)]
struct DbQueryCommand {
    /// Database to query.
    #[arg(long, value_enum, value_name = "DATABASE")]
    database: DatabaseArg,
    /// Read-only SQL statement.
    #[arg(long, value_name = "SQL")]
    sql: String,
    /// Coercion applied to the returned value.
    #[arg(long, value_enum, value_name = "TYPE", default_value = "text")]
    returns: ReturnTypeArg,
}

/// Coercion target for query results.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ReturnTypeArg {
    /// Text rendering.
    Text,
    /// Signed integer.
    Integer,
    /// Real number.
    Real,
    /// Boolean.
    Boolean,
    /// JSON list or map.
    Json,
}

impl From<ReturnTypeArg> for ReturnType {
    fn from(value: ReturnTypeArg) -> Self {
        match value {
            ReturnTypeArg::Text => Self::Text,
            ReturnTypeArg::Integer => Self::Integer,
            ReturnTypeArg::Real => Self::Real,
            ReturnTypeArg::Boolean => Self::Boolean,
            ReturnTypeArg::Json => Self::Json,
        }
    }
}

/// Run subcommands.
#[derive(Subcommand, Debug)]
enum RunCommand {
    /// Submit a run for a session.
    Submit(RunSubmitCommand),
    /// Refresh the state of a tracked run.
    Poll(RunPollCommand),
    /// List the runs of a session.
    List(RunListCommand),
}

/// Arguments for `run submit`.
#[derive(Args, Debug)]
struct RunSubmitCommand {
    /// Owning session identifier.
    #[arg(long, value_name = "ID")]
    session_id: String,
    /// Display name of the submitter.
    #[arg(long, value_name = "NAME")]
    submitted_by: String,
    /// Unique run name.
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Optional JSON file with job parameters.
    #[arg(long, value_name = "PATH")]
    parameters: Option<PathBuf>,
}

/// Arguments for `run poll`.
#[derive(Args, Debug)]
struct RunPollCommand {
    /// Run identifier.
    #[arg(long, value_name = "ID")]
    run_id: String,
}

/// Arguments for `run list`.
#[derive(Args, Debug)]
struct RunListCommand {
    /// Owning session identifier.
    #[arg(long, value_name = "ID")]
    session_id: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file.
    Check,
    /// Print an example configuration.
    Example,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// One database file created by `init`.
#[derive(Debug, Serialize)]
struct InitEntry {
    /// Logical database.
    database: LogicalDatabase,
    /// File path on disk.
    path: String,
    /// Tables present after initialization.
    tables: Vec<String>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    let config_path = cli.config.as_deref();

    match command {
        Commands::Init => command_init(config_path),
        Commands::User {
            command,
        } => command_user(config_path, command),
        Commands::Session {
            command,
        } => command_session(config_path, command),
        Commands::Dataset {
            command,
        } => command_dataset(config_path, command),
        Commands::Db {
            command,
        } => command_db(config_path, &command),
        Commands::Run {
            command,
        } => command_run(config_path, command),
        Commands::Config {
            command,
        } => command_config(config_path, &command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Loaded configuration with its open registry and audit sink.
struct Environment {
    /// Validated configuration.
    config: AssemblitConfig,
    /// Database registry.
    registry: DatabaseRegistry,
    /// Cascade audit sink.
    audit: Box<dyn StoreAuditSink>,
}

impl Environment {
    /// Loads configuration and opens the registry and audit sink.
    fn open(config_path: Option<&Path>) -> CliResult<Self> {
        let config = load_config(config_path)?;
        let registry = DatabaseRegistry::new(config.registry_config());
        registry
            .initialize()
            .map_err(|err| CliError::new(format!("failed to initialize databases: {err}")))?;
        let audit = open_audit_sink(&config.audit)?;
        Ok(Self {
            config,
            registry,
            audit,
        })
    }

    /// Returns the audit sink.
    fn audit(&self) -> &dyn StoreAuditSink {
        self.audit.as_ref()
    }

    /// Returns a vault bound to this environment.
    fn vault(&self) -> Vault<'_> {
        Vault::new(&self.registry, self.audit())
    }

    /// Returns a cascade orchestrator bound to this environment.
    fn cascades(&self) -> CascadeOrchestrator<'_> {
        CascadeOrchestrator::new(&self.registry, self.audit())
    }
}

/// Loads and validates configuration.
fn load_config(config_path: Option<&Path>) -> CliResult<AssemblitConfig> {
    AssemblitConfig::load(config_path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Builds the configured audit sink.
fn open_audit_sink(config: &AuditConfig) -> CliResult<Box<dyn StoreAuditSink>> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Box::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Box::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| CliError::new("audit file sink requires a path".to_string()))?;
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|err| {
                    CliError::new(format!(
                        "failed to create audit directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
            let sink = FileAuditSink::new(path).map_err(|err| {
                CliError::new(format!("failed to open audit log {}: {err}", path.display()))
            })?;
            Ok(Box::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Init Command
// ============================================================================

/// Executes `init`.
fn command_init(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let env = Environment::open(config_path)?;
    let mut entries = Vec::with_capacity(LogicalDatabase::ALL.len());
    for database in LogicalDatabase::ALL {
        let handle = env.registry.database(database).map_err(store_error)?;
        let tables = handle.select_table_names().map_err(store_error)?;
        entries.push(InitEntry {
            database,
            path: handle.path().display().to_string(),
            tables,
        });
    }
    emit_json(&entries)
}

// ============================================================================
// SECTION: User Commands
// ============================================================================

/// Dispatches account subcommands.
fn command_user(config_path: Option<&Path>, command: UserCommand) -> CliResult<ExitCode> {
    let env = Environment::open(config_path)?;
    let vault = env.vault();
    match command {
        UserCommand::Add(command) => {
            let user_id = vault
                .add_credentials(
                    &command.username,
                    &command.password,
                    &command.password,
                    command.first_name.as_deref(),
                )
                .map_err(|err| CliError::new(format!("sign up failed: {err}")))?;
            emit_json(&json!({"user_id": user_id}))
        }
        UserCommand::Login(command) => {
            let mut state = SessionState::new();
            let user_id = vault
                .authenticate(&command.username, &command.password, &mut state)
                .map_err(|err| CliError::new(format!("log in failed: {err}")))?;
            let first_name = state.user().and_then(|user| user.first_name.clone());
            emit_json(&json!({"user_id": user_id, "first_name": first_name}))
        }
        UserCommand::Passwd(command) => {
            vault
                .update_password(
                    &command.user_id,
                    &command.current,
                    &command.password,
                    &command.password,
                )
                .map_err(|err| CliError::new(format!("password change failed: {err}")))?;
            emit_json(&json!({"user_id": command.user_id, "updated": "password"}))
        }
        UserCommand::Rename(command) => {
            let username = vault
                .update_username(&command.user_id, &command.username)
                .map_err(|err| CliError::new(format!("username change failed: {err}")))?;
            emit_json(&json!({"user_id": command.user_id, "username": username}))
        }
        UserCommand::Delete(command) => {
            let mut state = SessionState::new();
            let report = vault
                .delete_account(&command.user_id, &command.password, &mut state)
                .map_err(|err| CliError::new(format!("account deletion failed: {err}")))?;
            emit_json(&report_json(&report))
        }
    }
}

// ============================================================================
// SECTION: Session Commands
// ============================================================================

/// Dispatches session subcommands.
fn command_session(config_path: Option<&Path>, command: SessionCommand) -> CliResult<ExitCode> {
    let env = Environment::open(config_path)?;
    let records = SessionRecords::new(&env.registry);
    match command {
        SessionCommand::Create(command) => {
            let settings: Value = read_json(&command.settings, "settings", MAX_SETTINGS_BYTES)?;
            let session_id =
                records.create_session(&command.user_id, &settings).map_err(store_error)?;
            emit_json(&json!({"session_id": session_id}))
        }
        SessionCommand::List(command) => {
            let sessions = records.list_sessions(&command.user_id).map_err(store_error)?;
            emit_json(&json!({"user_id": command.user_id, "sessions": sessions}))
        }
        SessionCommand::Delete(command) => {
            let report = env
                .cascades()
                .delete_session(&command.session_id, &mut SessionState::new())
                .map_err(store_error)?;
            emit_json(&report_json(&report))
        }
    }
}

// ============================================================================
// SECTION: Dataset Commands
// ============================================================================

/// Dispatches dataset subcommands.
fn command_dataset(config_path: Option<&Path>, command: DatasetCommand) -> CliResult<ExitCode> {
    let env = Environment::open(config_path)?;
    match command {
        DatasetCommand::Ingest(command) => {
            let upload: DatasetUpload = read_json(&command.file, "upload", MAX_UPLOAD_BYTES)?;
            let outcome = DatasetIngestor::new(&env.registry)
                .ingest(&command.session_id, &command.user_id, &upload)
                .map_err(store_error)?;
            emit_json(&outcome)
        }
        DatasetCommand::Delete(command) => {
            let report = env
                .cascades()
                .delete_dataset(&command.dataset_id, &mut SessionState::new())
                .map_err(store_error)?;
            emit_json(&report_json(&report))
        }
    }
}

// ============================================================================
// SECTION: Database Commands
// ============================================================================

/// Dispatches table inspection subcommands.
fn command_db(config_path: Option<&Path>, command: &DbCommand) -> CliResult<ExitCode> {
    let env = Environment::open(config_path)?;
    match command {
        DbCommand::Tables(command) => {
            let database = LogicalDatabase::from(command.database);
            let tables = env
                .registry
                .database(database)
                .and_then(|handle| handle.select_table_names())
                .map_err(store_error)?;
            emit_json(&json!({"database": database, "tables": tables}))
        }
        DbCommand::Count(command) => {
            let database = LogicalDatabase::from(command.database);
            let handle = env.registry.database(database).map_err(store_error)?;
            if !handle.table_exists(&command.table).map_err(store_error)? {
                return Err(CliError::new(format!(
                    "table {} not found in {database}",
                    command.table
                )));
            }
            let rows = handle.select_num_table_records(&command.table, None).map_err(store_error)?;
            emit_json(&json!({"database": database, "table": command.table, "rows": rows}))
        }
        DbCommand::Query(command) => {
            let database = LogicalDatabase::from(command.database);
            let value = env
                .registry
                .database(database)
                .and_then(|handle| {
                    handle.select_generic_query(&command.sql, command.returns.into())
                })
                .map_err(store_error)?;
            emit_json(&json!({"database": database, "value": value.to_json()}))
        }
    }
}

// ============================================================================
// SECTION: Run Commands
// ============================================================================

/// Dispatches run subcommands.
fn command_run(config_path: Option<&Path>, command: RunCommand) -> CliResult<ExitCode> {
    let env = Environment::open(config_path)?;
    let orchestrator =
        env.config.require_orchestrator().map_err(|err| CliError::new(err.to_string()))?;
    let client =
        OrchestratorClient::new(orchestrator).map_err(|err| CliError::new(err.to_string()))?;
    let tracker = RunTracker::new(&env.registry, &client, orchestrator);
    match command {
        RunCommand::Submit(command) => {
            let parameters = match &command.parameters {
                Some(path) => read_json(path, "parameters", MAX_SETTINGS_BYTES)?,
                None => Value::Object(Map::new()),
            };
            let record = tracker
                .submit(&command.session_id, &command.submitted_by, &command.name, parameters)
                .map_err(|err| CliError::new(format!("run submission failed: {err}")))?;
            emit_json(&record)
        }
        RunCommand::Poll(command) => {
            let record = tracker
                .refresh(&command.run_id)
                .map_err(|err| CliError::new(format!("run refresh failed: {err}")))?;
            emit_json(&record)
        }
        RunCommand::List(command) => {
            let runs = tracker
                .list_runs(&command.session_id)
                .map_err(|err| CliError::new(err.to_string()))?;
            emit_json(&json!({"session_id": command.session_id, "runs": runs}))
        }
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(config_path: Option<&Path>, command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check => {
            load_config(config_path)?;
            write_stdout_line("config ok")
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        ConfigCommand::Example => {
            let example = config_yaml_example();
            write_stdout_line(example.trim_end())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a cascade report as JSON.
fn report_json(report: &CascadeReport) -> Value {
    let steps: Vec<Value> = report
        .steps
        .iter()
        .map(|step| {
            json!({
                "database": step.database,
                "action": step.action,
                "table": step.table,
                "rows": step.rows,
            })
        })
        .collect();
    let removed: Map<String, Value> = report
        .removed
        .iter()
        .map(|(database, ids)| {
            (database.as_str().to_string(), Value::Array(ids.iter().map(Scalar::to_json).collect()))
        })
        .collect();
    json!({
        "kind": report.kind,
        "root_id": report.root_id,
        "steps": steps,
        "removed": removed,
    })
}

/// Maps a storage error to a CLI error.
fn store_error(err: StoreError) -> CliError {
    CliError::new(format!("storage error: {err}"))
}

// ============================================================================
// SECTION: File Input
// ============================================================================

/// Reads and decodes a bounded JSON file.
fn read_json<T: DeserializeOwned>(path: &Path, kind: &str, max_bytes: usize) -> CliResult<T> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {kind} file {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{kind} file {} is {size} bytes, over the {limit} byte limit",
            path.display()
        )),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid {kind} file {}: {err}", path.display())))
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn emit_json<T: Serialize>(value: &T) -> CliResult<ExitCode> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
