//! Configuration management for oasis-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Prefix of every environment variable read by [`Config::apply_env`].
pub const ENV_PREFIX: &str = "OASIS_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Relational source configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Document target configuration
    #[serde(default)]
    pub mongodb: MongoConfig,

    /// Payload layout
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Oracle connection and procedure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Database user
    #[serde(default)]
    pub user: String,

    /// Database password
    #[serde(default)]
    pub password: String,

    /// Easy Connect string or TNS alias
    #[serde(default = "default_connect_string")]
    pub connect_string: String,

    /// Fully qualified procedure name
    #[serde(default = "default_procedure")]
    pub procedure: String,

    /// Name of the tenant input parameter
    #[serde(default = "default_input_parameter")]
    pub input_parameter: String,

    /// Name of the CLOB output parameter
    #[serde(default = "default_output_parameter")]
    pub output_parameter: String,

    /// Largest accepted output payload, in characters
    #[serde(default = "default_max_payload_chars")]
    pub max_payload_chars: u64,

    /// Procedure call timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout: u64,

    /// Maximum pooled connections
    #[serde(default = "default_oracle_pool_size")]
    pub max_pool_size: u32,

    /// Seconds to wait for a pooled connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Substrings that mark the output as a procedure-reported error
    #[serde(default = "default_error_markers")]
    pub error_markers: Vec<String>,
}

/// MongoDB connection and target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// MongoDB connection URI
    #[serde(default = "default_mongodb_uri")]
    pub uri: String,

    /// Target database
    #[serde(default = "default_database")]
    pub database: String,

    /// Target collection
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub timeout: u64,

    /// Number of retry attempts on connection failure
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Maximum pool size
    #[serde(default = "default_mongo_pool_size")]
    pub max_pool_size: u32,

    /// Minimum pool size
    #[serde(default)]
    pub min_pool_size: u32,
}

/// Payload layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Top-level field holding the record array
    #[serde(default = "default_records_field")]
    pub records_field: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Path to log file (None for stderr)
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_connect_string() -> String {
    "localhost:1521/XEPDB1".to_string()
}

fn default_procedure() -> String {
    "PKG_BEM_ESTAR.SP_EXPORTAR_DATASET_EMPRESA".to_string()
}

fn default_input_parameter() -> String {
    "p_empresa_id".to_string()
}

fn default_output_parameter() -> String {
    "p_json_dataset".to_string()
}

fn default_max_payload_chars() -> u64 {
    50_000
}

fn default_call_timeout() -> u64 {
    60
}

fn default_oracle_pool_size() -> u32 {
    4
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_error_markers() -> Vec<String> {
    vec!["\"erro\"".to_string()]
}

fn default_mongodb_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "oasis".to_string()
}

fn default_collection() -> String {
    "usuarios".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_mongo_pool_size() -> u32 {
    10
}

fn default_records_field() -> String {
    "usuarios".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            connect_string: default_connect_string(),
            procedure: default_procedure(),
            input_parameter: default_input_parameter(),
            output_parameter: default_output_parameter(),
            max_payload_chars: default_max_payload_chars(),
            call_timeout: default_call_timeout(),
            max_pool_size: default_oracle_pool_size(),
            connect_timeout: default_connect_timeout(),
            error_markers: default_error_markers(),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_mongodb_uri(),
            database: default_database(),
            collection: default_collection(),
            timeout: default_connect_timeout(),
            retry_attempts: default_retry_attempts(),
            max_pool_size: default_mongo_pool_size(),
            min_pool_size: 0,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            records_field: default_records_field(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_path: None,
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    ///
    /// # Arguments
    /// * `text` - TOML document
    ///
    /// # Returns
    /// * `Result<Config>` - Parsed configuration or error
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from a file
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and defaults otherwise.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) if !p.exists() => {
                return Err(ConfigError::FileNotFound(p.display().to_string()).into());
            }
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    tracing::debug!("No config file at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&text)
    }

    /// Override values from `OASIS_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Override values using a variable lookup function
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, if set
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(v) = var("ORACLE_USER") {
            self.oracle.user = v;
        }
        if let Some(v) = var("ORACLE_PASSWORD") {
            self.oracle.password = v;
        }
        if let Some(v) = var("ORACLE_CONNECT_STRING") {
            self.oracle.connect_string = v;
        }
        if let Some(v) = var("ORACLE_PROCEDURE") {
            self.oracle.procedure = v;
        }
        if let Some(v) = var("MONGODB_URI") {
            self.mongodb.uri = v;
        }
        if let Some(v) = var("MONGODB_DATABASE") {
            self.mongodb.database = v;
        }
        if let Some(v) = var("MONGODB_COLLECTION") {
            self.mongodb.collection = v;
        }
        if let Some(level) = var("LOG_LEVEL").and_then(|v| LogLevel::parse(&v)) {
            self.logging.level = level;
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".oasis-export")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        let oracle = &self.oracle;

        if !is_valid_procedure_name(&oracle.procedure) {
            return Err(invalid("oracle.procedure", &oracle.procedure));
        }
        for (field, value) in [
            ("oracle.input_parameter", &oracle.input_parameter),
            ("oracle.output_parameter", &oracle.output_parameter),
        ] {
            if !is_valid_identifier(value) {
                return Err(invalid(field, value));
            }
        }
        if oracle.input_parameter.eq_ignore_ascii_case(&oracle.output_parameter) {
            return Err(invalid("oracle.output_parameter", &oracle.output_parameter));
        }
        if oracle.connect_string.trim().is_empty() {
            return Err(ConfigError::MissingField("oracle.connect_string".into()).into());
        }
        if oracle.max_payload_chars == 0 {
            return Err(invalid("oracle.max_payload_chars", "0"));
        }
        if oracle.call_timeout == 0 {
            return Err(invalid("oracle.call_timeout", "0"));
        }
        if oracle.max_pool_size == 0 {
            return Err(invalid("oracle.max_pool_size", "0"));
        }
        if oracle.error_markers.iter().any(|m| m.is_empty()) {
            return Err(invalid("oracle.error_markers", ""));
        }

        let mongo = &self.mongodb;
        if !crate::utils::validate::is_valid_connection_uri(&mongo.uri) {
            return Err(invalid("mongodb.uri", &crate::utils::sanitize_uri(&mongo.uri)));
        }
        if !crate::utils::validate::is_valid_database_name(&mongo.database) {
            return Err(invalid("mongodb.database", &mongo.database));
        }
        if !crate::utils::validate::is_valid_collection_name(&mongo.collection) {
            return Err(invalid("mongodb.collection", &mongo.collection));
        }
        if mongo.max_pool_size == 0 || mongo.min_pool_size > mongo.max_pool_size {
            return Err(invalid("mongodb.min_pool_size", &mongo.min_pool_size.to_string()));
        }

        if self.dataset.records_field.is_empty() {
            return Err(ConfigError::MissingField("dataset.records_field".into()).into());
        }

        Ok(())
    }

    /// Render the configuration as TOML with secrets masked
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.oracle.password.is_empty() {
            shown.oracle.password = "***".to_string();
        }
        shown.mongodb.uri = crate::utils::sanitize_uri(&shown.mongodb.uri);
        toml::to_string_pretty(&shown).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get procedure call timeout as Duration
    pub fn procedure_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle.call_timeout)
    }
}

impl LogLevel {
    /// Parse a level name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// Oracle simple identifier: a letter followed by letters, digits, `_`, `$`, `#`
fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    s.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
}

/// `[schema.][package.]procedure`, each part a simple identifier
fn is_valid_procedure_name(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() <= 3 && parts.iter().all(|p| is_valid_identifier(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mongodb.uri, "mongodb://localhost:27017");
        assert_eq!(config.oracle.max_payload_chars, 50_000);
        assert_eq!(config.dataset.records_field, "usuarios");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [oracle]
            user = "oasis"
            max_payload_chars = 1000

            [mongodb]
            collection = "snapshot"
            "#,
        )
        .unwrap();

        assert_eq!(config.oracle.user, "oasis");
        assert_eq!(config.oracle.max_payload_chars, 1000);
        assert_eq!(config.oracle.output_parameter, "p_json_dataset");
        assert_eq!(config.mongodb.collection, "snapshot");
        assert_eq!(config.mongodb.database, "oasis");
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_toml_is_format_error() {
        let err = Config::from_toml_str("[oracle\nuser =").unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportError::Config(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/oasis.toml"))).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExportError::Config(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OASIS_ORACLE_USER", "scott"),
            ("OASIS_MONGODB_COLLECTION", "usuarios_v2"),
            ("OASIS_LOG_LEVEL", "DEBUG"),
            ("OASIS_MONGODB_DATABASE", ""),
        ]);
        let mut config = Config::default();
        config.apply_env_with(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.oracle.user, "scott");
        assert_eq!(config.mongodb.collection, "usuarios_v2");
        assert_eq!(config.mongodb.database, "oasis");
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_validate_rejects_injected_procedure_name() {
        let mut config = Config::default();
        config.oracle.procedure = "PKG.SP; DROP TABLE TB_USUARIO".into();
        assert!(config.validate().is_err());

        config.oracle.procedure = "APP.PKG_BEM_ESTAR.SP_EXPORTAR".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = Config::default();
        config.oracle.max_payload_chars = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mongodb.uri = "http://localhost".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.oracle.output_parameter = "P_EMPRESA_ID".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_display_masks_secrets() {
        let mut config = Config::default();
        config.oracle.password = "tiger".into();
        config.mongodb.uri = "mongodb://admin:secret@db:27017".into();

        let shown = config.to_display_toml().unwrap();
        assert!(!shown.contains("tiger"));
        assert!(!shown.contains("secret"));
        assert!(shown.contains("db:27017"));
    }

    #[test]
    fn test_timeouts() {
        let config = Config::default();
        assert_eq!(config.procedure_timeout(), Duration::from_secs(60));
    }
}
