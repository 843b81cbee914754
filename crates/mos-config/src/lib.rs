//! Mosaic Configuration System
//!
//! TOML configuration with `MOSAIC_*` environment variable overrides.
//! Every section has defaults, so an empty file (or no file at all) yields a
//! runnable development setup backed by a local SQLite database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub sql: SqlConfig,
    pub mongodb: MongoConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relational backend. An empty `url` disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a connection waits for the write lock before failing
    pub busy_timeout_ms: u64,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/mosaic.db?mode=rwc".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl SqlConfig {
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Document backend. An empty `uri` disables it.
///
/// Multi-document transactions need a replica set; against a standalone
/// server sessions still work but transactions degrade to plain writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: "mosaic".to_string(),
        }
    }
}

impl MongoConfig {
    pub fn is_enabled(&self) -> bool {
        !self.uri.trim().is_empty()
    }
}

/// Which datastore backs a module's repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sql,
    Document,
    Memory,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sql" | "sqlite" => Some(StoreBackend::Sql),
            "document" | "mongodb" | "mongo" => Some(StoreBackend::Document),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sql => write!(f, "sql"),
            StoreBackend::Document => write!(f, "document"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Per-module backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub user: StoreBackend,
    pub product: StoreBackend,
    pub auth: StoreBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            user: StoreBackend::Sql,
            product: StoreBackend::Sql,
            auth: StoreBackend::Sql,
        }
    }
}

impl StorageConfig {
    fn modules(&self) -> [(&'static str, StoreBackend); 3] {
        [
            ("user", self.user),
            ("product", self.product),
            ("auth", self.auth),
        ]
    }

    pub fn uses(&self, backend: StoreBackend) -> bool {
        self.modules().iter().any(|(_, b)| *b == backend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordPolicyLevel {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in seconds
    pub session_ttl_secs: i64,
    pub password_policy: PasswordPolicyLevel,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 8 * 3600,
            password_policy: PasswordPolicyLevel::Strict,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Buffer of the broadcast channel feeding streaming observers
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from the standard search paths with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Reject module/backend combinations that cannot be wired.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::ValidationError(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "events.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.auth.session_ttl_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_ttl_secs must be positive".to_string(),
            ));
        }

        for (module, backend) in self.storage.modules() {
            let available = match backend {
                StoreBackend::Sql => self.sql.is_enabled(),
                StoreBackend::Document => self.mongodb.is_enabled(),
                StoreBackend::Memory => true,
            };
            if !available {
                return Err(ConfigError::ValidationError(format!(
                    "storage.{} = \"{}\" but the {} backend is not configured",
                    module, backend, backend
                )));
            }
        }
        Ok(())
    }

    pub fn example_toml() -> String {
        r#"# Mosaic Configuration
# Environment variables (MOSAIC_*) override these settings

[http]
host = "0.0.0.0"
port = 8080

[sql]
# Empty url disables the relational backend
url = "sqlite://./data/mosaic.db?mode=rwc"
max_connections = 5
busy_timeout_ms = 5000

[mongodb]
# Empty uri disables the document backend
uri = ""
database = "mosaic"

[storage]
# sql, document or memory
user = "sql"
product = "sql"
auth = "sql"

[auth]
session_ttl_secs = 28800
password_policy = "strict"  # strict or lenient

[events]
channel_capacity = 256
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.http.port, 8080);
        assert!(config.sql.is_enabled());
        assert!(!config.mongodb.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_toml_parses() {
        let config = AppConfig::from_toml(&AppConfig::example_toml()).unwrap();
        assert_eq!(config.storage.user, StoreBackend::Sql);
        assert_eq!(config.auth.password_policy, PasswordPolicyLevel::Strict);
        assert_eq!(config.events.channel_capacity, 256);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
[storage]
product = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.storage.product, StoreBackend::Memory);
        assert_eq!(config.storage.user, StoreBackend::Sql);
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_document_storage_requires_mongodb() {
        let mut config = AppConfig::default();
        config.storage.user = StoreBackend::Document;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.user"));

        config.mongodb.uri = "mongodb://localhost:27017".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_storage_without_backends() {
        let mut config = AppConfig::default();
        config.sql.url = String::new();
        config.storage.user = StoreBackend::Memory;
        config.storage.product = StoreBackend::Memory;
        config.storage.auth = StoreBackend::Memory;
        assert!(config.validate().is_ok());
        assert!(!config.storage.uses(StoreBackend::Sql));
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(StoreBackend::parse("SQLite"), Some(StoreBackend::Sql));
        assert_eq!(StoreBackend::parse("mongo"), Some(StoreBackend::Document));
        assert_eq!(StoreBackend::parse("memory"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("redis"), None);
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let result = AppConfig::from_toml("[storage]\nuser = \"redis\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
