//! Connection and mapping configuration.
//!
//! A `Config` can be read from a TOML file, built from a flat parameter map
//! (`host`, `port`, `dbname`, `keyColumn`, `users.keyColumn`, ...) or
//! constructed in code. The following environment variables override file
//! settings when `apply_env_overrides` is called:
//!
//! - `DOCSQL_HOST` - Server host
//! - `DOCSQL_PORT` - Server port
//! - `DOCSQL_DATABASE` - Target database

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{DbError, DbResult};

/// Native key field of every stored document
pub const NATIVE_KEY_FIELD: &str = "_id";

pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_MAX_POOL_SIZE: usize = 1;
pub const DEFAULT_MAX_SAMPLED_DOCUMENTS: usize = 20;

/// Environment variable names
pub const ENV_HOST: &str = "DOCSQL_HOST";
pub const ENV_PORT: &str = "DOCSQL_PORT";
pub const ENV_DATABASE: &str = "DOCSQL_DATABASE";

/// Flat parameter keys
const HOST_KEY: &str = "host";
const PORT_KEY: &str = "port";
const DBNAME_KEY: &str = "dbname";
const TIMEOUT_KEY: &str = "timeoutSec";
const CREDENTIALS_KEY: &str = "credentials";
const KEY_COLUMN_KEY: &str = "keyColumn";
const MAX_POOL_SIZE_KEY: &str = "maxPoolSize";
const MAX_SAMPLED_KEY: &str = "maxSampledDocuments";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server host
    #[serde(default)]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Target database
    #[serde(default, alias = "dbname")]
    pub database: String,
    /// Connect timeout in seconds; the store default applies when unset
    #[serde(default)]
    pub timeout_sec: Option<u64>,
    /// Path to a JSON credential file
    #[serde(default)]
    pub credentials: Option<String>,
    /// Logical key column used by every table without an override
    #[serde(default = "default_key_column")]
    pub key_column: String,
    /// Per-table settings
    #[serde(default)]
    pub tables: HashMap<String, TableConfig>,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
    /// Upper bound of documents read when sampling a table schema
    #[serde(default = "default_max_sampled_documents")]
    pub max_sampled_documents: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub key_column: Option<String>,
}

/// Username/password pair read from the `credentials` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_key_column() -> String {
    NATIVE_KEY_FIELD.to_string()
}

fn default_max_pool_size() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

fn default_max_sampled_documents() -> usize {
    DEFAULT_MAX_SAMPLED_DOCUMENTS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            database: String::new(),
            timeout_sec: None,
            credentials: None,
            key_column: default_key_column(),
            tables: HashMap::new(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            max_sampled_documents: DEFAULT_MAX_SAMPLED_DOCUMENTS,
        }
    }
}

impl Config {
    /// Create a new configuration with the given settings
    pub fn new(host: &str, database: &str) -> Self {
        Self {
            host: host.to_string(),
            database: database.to_string(),
            ..Self::default()
        }
    }

    /// Set the global logical key column
    pub fn with_key_column(mut self, column: &str) -> Self {
        self.key_column = column.to_string();
        self
    }

    /// Set the logical key column of one table
    pub fn with_table_key_column(mut self, table: &str, column: &str) -> Self {
        self.set_table_key_column(table, column);
        self
    }

    pub fn set_table_key_column(&mut self, table: &str, column: &str) {
        self.tables.entry(table.to_string()).or_default().key_column = Some(column.to_string());
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> DbResult<Self> {
        toml::from_str(content).map_err(|e| DbError::ConfigError(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> DbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DbError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Build configuration from flat key/value parameters.
    ///
    /// Keys of the form `<table>.keyColumn` set per-table key columns.
    pub fn from_parameters<I, K, V>(parameters: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in parameters {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                HOST_KEY => config.host = value.to_string(),
                PORT_KEY => config.port = parse_parameter(key, value)?,
                DBNAME_KEY => config.database = value.to_string(),
                TIMEOUT_KEY => config.timeout_sec = Some(parse_parameter(key, value)?),
                CREDENTIALS_KEY => config.credentials = Some(value.to_string()),
                KEY_COLUMN_KEY => config.key_column = value.to_string(),
                MAX_POOL_SIZE_KEY => config.max_pool_size = parse_parameter(key, value)?,
                MAX_SAMPLED_KEY => config.max_sampled_documents = parse_parameter(key, value)?,
                _ => match key.strip_suffix(&format!(".{}", KEY_COLUMN_KEY)) {
                    Some(table) if !table.is_empty() => config.set_table_key_column(table, value),
                    _ => tracing::debug!("Ignoring unknown config parameter '{}'", key),
                },
            }
        }
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var(ENV_HOST) {
            if !host.is_empty() {
                self.host = host;
            }
        }

        if let Ok(port_str) = std::env::var(ENV_PORT) {
            if let Ok(port) = port_str.parse::<u16>() {
                self.port = port;
            }
        }

        if let Ok(database) = std::env::var(ENV_DATABASE) {
            if !database.is_empty() {
                self.database = database;
            }
        }
    }

    /// Checks the settings required before any network activity
    pub fn validate(&self) -> DbResult<()> {
        if self.database.is_empty() {
            return Err(DbError::ConfigError("dbname was empty".to_string()));
        }
        if self.host.is_empty() {
            return Err(DbError::ConfigError("host was empty".to_string()));
        }
        Ok(())
    }

    /// `host:port` address of the store
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.timeout_sec.map(Duration::from_secs)
    }

    /// Logical key column of a table: table override, then global default,
    /// then the native key field.
    pub fn key_column(&self, table: &str) -> &str {
        if let Some(column) = self
            .tables
            .get(table)
            .and_then(|t| t.key_column.as_deref())
            .filter(|c| !c.is_empty())
        {
            return column;
        }
        if self.key_column.is_empty() {
            NATIVE_KEY_FIELD
        } else {
            &self.key_column
        }
    }

    /// Reads the credential file, if one is configured
    pub fn load_credential(&self) -> DbResult<Option<Credential>> {
        let Some(path) = self.credentials.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| DbError::ConfigError(format!("failed to read credentials {}: {}", path, e)))?;
        let credential = serde_json::from_str(&content)
            .map_err(|e| DbError::ConfigError(format!("invalid credentials {}: {}", path, e)))?;
        Ok(Some(credential))
    }
}

fn parse_parameter<T: std::str::FromStr>(key: &str, value: &str) -> DbResult<T> {
    value
        .parse()
        .map_err(|_| DbError::ConfigError(format!("invalid value '{}' for {}", value, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_parameters() {
        let config = Config::from_parameters([
            ("host", "127.0.0.1"),
            ("port", "1111"),
            ("dbname", "mydb"),
            ("timeoutSec", "1"),
            ("keyColumn", "id"),
            ("orders.keyColumn", "order_id"),
        ])
        .unwrap();

        assert_eq!(config.address(), "127.0.0.1:1111");
        assert_eq!(config.database, "mydb");
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(config.key_column("users"), "id");
        assert_eq!(config.key_column("orders"), "order_id");
    }

    #[test]
    fn test_invalid_parameter() {
        let err = Config::from_parameters([("port", "abc")]).unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));
    }

    #[test]
    fn test_key_column_fallback() {
        let mut config = Config::new("localhost", "mydb");
        assert_eq!(config.key_column("users"), NATIVE_KEY_FIELD);

        config.key_column = String::new();
        assert_eq!(config.key_column("users"), NATIVE_KEY_FIELD);
    }

    #[test]
    fn test_toml_config() {
        let config = Config::from_toml_str(
            r#"
            host = "localhost"
            dbname = "mydb"
            key_column = "id"

            [tables.events]
            key_column = "event_id"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_sampled_documents, DEFAULT_MAX_SAMPLED_DOCUMENTS);
        assert_eq!(config.key_column("users"), "id");
        assert_eq!(config.key_column("events"), "event_id");
    }

    #[test]
    fn test_validate() {
        assert!(Config::new("localhost", "mydb").validate().is_ok());
        assert!(matches!(
            Config::new("", "mydb").validate(),
            Err(DbError::ConfigError(_))
        ));
        assert!(matches!(
            Config::new("localhost", "").validate(),
            Err(DbError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_credential() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "app", "password": "secret"}}"#).unwrap();

        let mut config = Config::new("localhost", "mydb");
        assert_eq!(config.load_credential().unwrap(), None);

        config.credentials = Some(file.path().to_string_lossy().to_string());
        let credential = config.load_credential().unwrap().unwrap();
        assert_eq!(credential.username, "app");
        assert_eq!(credential.password, "secret");
    }
}
