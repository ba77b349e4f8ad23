// crates/assemblit-config/src/config.rs
// ============================================================================
// Module: Assemblit Configuration
// Description: Configuration loading and validation for Assemblit.
// Purpose: Parse `.assemblit/config.yaml` with hard limits and fail closed.
// Dependencies: assemblit-store, serde, serde_yaml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a YAML file with strict size and path limits.
//! Every section has defaults except the orchestration server, which is only
//! required by run submission. Database names and query indexes end up in
//! generated SQL, so they are validated as identifiers here rather than at
//! first use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use assemblit_store::DatabaseSettings;
use assemblit_store::LogicalDatabase;
use assemblit_store::RegistryConfig;
use assemblit_store::SqliteJournalMode;
use assemblit_store::SqliteSyncMode;
use assemblit_store::connection::DEFAULT_BUSY_TIMEOUT_MS;
use assemblit_store::sql::validate_identifier;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration path when no path is specified.
pub const DEFAULT_CONFIG_PATH: &str = ".assemblit/config.yaml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "ASSEMBLIT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum busy timeout accepted for sqlite handles.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum HTTP timeout for orchestration calls.
pub(crate) const MAX_HTTP_TIMEOUT_MS: u64 = 120_000;
/// Default web client port.
const DEFAULT_CLIENT_PORT: u16 = 8501;
/// Default orchestration server port.
const DEFAULT_SERVER_PORT: u16 = 4200;
/// Default orchestration HTTP timeout.
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O errors while reading config.
    #[error("config io error: {0}")]
    Io(String),
    /// Parsing errors.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Validation errors.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Top-level Assemblit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssemblitConfig {
    /// Application settings.
    #[serde(default)]
    pub app: AppConfig,
    /// Database storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Orchestration server settings; required for run submission.
    #[serde(default)]
    pub orchestrator: Option<OrchestratorConfig>,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AssemblitConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_yaml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses YAML without validating.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed YAML or unknown keys.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Renders the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.app.validate()?;
        self.storage.validate()?;
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.validate()?;
        }
        self.audit.validate()?;
        Ok(())
    }

    /// Builds the database registry configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        self.storage.registry_config()
    }

    /// Returns the orchestration settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the section is missing.
    pub fn require_orchestrator(&self) -> Result<&OrchestratorConfig, ConfigError> {
        self.orchestrator.as_ref().ok_or_else(|| {
            ConfigError::Invalid("orchestrator section is required for run submission".to_string())
        })
    }
}

// ============================================================================
// SECTION: App
// ============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppEnvironment {
    /// Local development.
    #[default]
    Dev,
    /// Test deployment.
    Test,
    /// Production deployment.
    Prod,
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application name.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Deployment environment.
    #[serde(default)]
    pub env: AppEnvironment,
    /// Application version.
    #[serde(default = "default_app_version")]
    pub version: String,
    /// Debug mode.
    #[serde(default)]
    pub debug: bool,
    /// Whether pages require a logged-in user.
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    /// Web client port.
    #[serde(default = "default_client_port")]
    pub client_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: AppEnvironment::default(),
            version: default_app_version(),
            debug: false,
            require_authentication: true,
            client_port: DEFAULT_CLIENT_PORT,
        }
    }
}

impl AppConfig {
    /// Validates application settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_non_empty("app.name", &self.name)?;
        validate_non_empty("app.version", &self.version)?;
        validate_port("app.client_port", self.client_port)
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Database storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding every database file.
    #[serde(default = "default_db_dir")]
    pub dir: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Users database.
    #[serde(default = "default_users")]
    pub users: DatabaseSettings,
    /// Sessions database.
    #[serde(default = "default_sessions")]
    pub sessions: DatabaseSettings,
    /// Data database.
    #[serde(default = "default_data")]
    pub data: DatabaseSettings,
    /// Analysis database.
    #[serde(default = "default_analysis")]
    pub analysis: DatabaseSettings,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_db_dir(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
            users: default_users(),
            sessions: default_sessions(),
            data: default_data(),
            analysis: default_analysis(),
        }
    }
}

impl StorageConfig {
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

    /// Builds the database registry configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            dir: self.dir.clone(),
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            data: self.data.clone(),
            analysis: self.analysis.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Validates storage settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.dir", &self.dir.to_string_lossy())?;
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "storage.busy_timeout_ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        let mut names = BTreeSet::new();
        let mut indexes = BTreeSet::new();
        for database in LogicalDatabase::ALL {
            let settings = self.settings(database);
            let field = format!("storage.{database}");
            validate_name(&format!("{field}.name"), &settings.name)?;
            validate_name(&format!("{field}.query_index"), &settings.query_index)?;
            if !names.insert(settings.name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate storage database name: {}",
                    settings.name
                )));
            }
            if !indexes.insert(settings.query_index.to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate storage query_index: {}",
                    settings.query_index
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Orchestration server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// API route prefix.
    #[serde(default = "default_api_route")]
    pub api_route: String,
    /// Flow (job) name.
    pub job_name: String,
    /// Deployment name.
    pub deployment_name: String,
    /// Client name sent with CSRF requests.
    #[serde(default = "default_app_name")]
    pub client_name: String,
    /// HTTP timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl OrchestratorConfig {
    /// Validates orchestration settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_non_empty("orchestrator.host", &self.host)?;
        validate_port("orchestrator.port", self.port)?;
        validate_non_empty("orchestrator.job_name", &self.job_name)?;
        validate_non_empty("orchestrator.deployment_name", &self.deployment_name)?;
        validate_non_empty("orchestrator.client_name", &self.client_name)?;
        if self.api_route.contains(['?', '#']) {
            return Err(ConfigError::Invalid(
                "orchestrator.api_route must be a plain path".to_string(),
            ));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_HTTP_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.timeout_ms must be between 1 and {MAX_HTTP_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Returns the API base URL, e.g. `http://localhost:4200/api`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let route = self.api_route.trim_matches('/');
        if route.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}/{route}", self.host, self.port)
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default application name.
fn default_app_name() -> String {
    "assemblit".to_string()
}

/// Default application version.
fn default_app_version() -> String {
    "0.1.0".to_string()
}

/// Returns true.
const fn default_true() -> bool {
    true
}

/// Default web client port.
const fn default_client_port() -> u16 {
    DEFAULT_CLIENT_PORT
}

/// Default database directory.
fn default_db_dir() -> PathBuf {
    PathBuf::from("db")
}

/// Default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default users database settings.
fn default_users() -> DatabaseSettings {
    DatabaseSettings::default_for(LogicalDatabase::Users)
}

/// Default sessions database settings.
fn default_sessions() -> DatabaseSettings {
    DatabaseSettings::default_for(LogicalDatabase::Sessions)
}

/// Default data database settings.
fn default_data() -> DatabaseSettings {
    DatabaseSettings::default_for(LogicalDatabase::Data)
}

/// Default analysis database settings.
fn default_analysis() -> DatabaseSettings {
    DatabaseSettings::default_for(LogicalDatabase::Analysis)
}

/// Default orchestration host.
fn default_host() -> String {
    "localhost".to_string()
}

/// Default orchestration port.
const fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

/// Default API route.
fn default_api_route() -> String {
    "api".to_string()
}

/// Default orchestration HTTP timeout.
const fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Rejects empty or untrimmed strings.
fn validate_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.trim() != value {
        return Err(ConfigError::Invalid(format!("{field} must be trimmed")));
    }
    Ok(())
}

/// Validates a database or column name used in generated SQL.
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    validate_non_empty(field, value)?;
    if value.contains(['/', '\\']) {
        return Err(ConfigError::Invalid(format!("{field} must not contain path separators")));
    }
    validate_identifier(value).map_err(|err| ConfigError::Invalid(format!("{field}: {err}")))
}

/// Rejects port zero.
fn validate_port(field: &str, port: u16) -> Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and 65535")));
    }
    Ok(())
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
    fn empty_yaml_uses_defaults() {
        let config = AssemblitConfig::from_yaml("").unwrap();
        assert_eq!(config, AssemblitConfig::default());
        config.validate().unwrap();
        assert_eq!(config.storage.data.query_index, "dataset_id");
    }

    #[test]
    fn base_url_joins_route() {
        let config = OrchestratorConfig {
            host: "localhost".to_string(),
            port: 4200,
            api_route: "/api/".to_string(),
            job_name: "forecast".to_string(),
            deployment_name: "main".to_string(),
            client_name: "assemblit".to_string(),
            timeout_ms: 1_000,
        };
        assert_eq!(config.base_url(), "http://localhost:4200/api");
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let long = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        assert!(validate_path_string("storage.dir", &long).is_err());
        assert!(validate_path_string("storage.dir", "  ").is_err());
        assert!(validate_path_string("storage.dir", "db/app").is_ok());
    }
}
