//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError, PasswordPolicyLevel, StoreBackend};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "mosaic.toml",
    "./config/config.toml",
    "/etc/mosaic/config.toml",
];

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load from file (if found), apply `MOSAIC_*` overrides, then validate.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with a custom variable source.
    pub fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup) {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, &lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn find_config_file<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Some(path) = lookup("MOSAIC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{} has an invalid value: {}", key, value)))
}

fn parse_backend(key: &str, value: &str) -> Result<StoreBackend, ConfigError> {
    StoreBackend::parse(value)
        .ok_or_else(|| ConfigError::EnvError(format!("{} has an invalid backend: {}", key, value)))
}

fn apply_overrides<F>(config: &mut AppConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // HTTP
    if let Some(val) = lookup("MOSAIC_HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(val) = lookup("MOSAIC_HTTP_PORT") {
        config.http.port = parse_var("MOSAIC_HTTP_PORT", &val)?;
    }

    // SQL
    if let Some(val) = lookup("MOSAIC_SQL_URL") {
        config.sql.url = val;
    }
    if let Some(val) = lookup("MOSAIC_SQL_MAX_CONNECTIONS") {
        config.sql.max_connections = parse_var("MOSAIC_SQL_MAX_CONNECTIONS", &val)?;
    }
    if let Some(val) = lookup("MOSAIC_SQL_BUSY_TIMEOUT_MS") {
        config.sql.busy_timeout_ms = parse_var("MOSAIC_SQL_BUSY_TIMEOUT_MS", &val)?;
    }

    // MongoDB
    if let Some(val) = lookup("MOSAIC_MONGODB_URI") {
        config.mongodb.uri = val;
    }
    if let Some(val) = lookup("MOSAIC_MONGODB_DATABASE") {
        config.mongodb.database = val;
    }

    // Storage
    if let Some(val) = lookup("MOSAIC_STORAGE_USER") {
        config.storage.user = parse_backend("MOSAIC_STORAGE_USER", &val)?;
    }
    if let Some(val) = lookup("MOSAIC_STORAGE_PRODUCT") {
        config.storage.product = parse_backend("MOSAIC_STORAGE_PRODUCT", &val)?;
    }
    if let Some(val) = lookup("MOSAIC_STORAGE_AUTH") {
        config.storage.auth = parse_backend("MOSAIC_STORAGE_AUTH", &val)?;
    }

    // Auth
    if let Some(val) = lookup("MOSAIC_AUTH_SESSION_TTL_SECS") {
        config.auth.session_ttl_secs = parse_var("MOSAIC_AUTH_SESSION_TTL_SECS", &val)?;
    }
    if let Some(val) = lookup("MOSAIC_AUTH_PASSWORD_POLICY") {
        config.auth.password_policy = match val.trim().to_ascii_lowercase().as_str() {
            "strict" => PasswordPolicyLevel::Strict,
            "lenient" => PasswordPolicyLevel::Lenient,
            other => {
                return Err(ConfigError::EnvError(format!(
                    "MOSAIC_AUTH_PASSWORD_POLICY has an invalid value: {}",
                    other
                )))
            }
        };
    }

    // Events
    if let Some(val) = lookup("MOSAIC_EVENTS_CHANNEL_CAPACITY") {
        config.events.channel_capacity = parse_var("MOSAIC_EVENTS_CHANNEL_CAPACITY", &val)?;
    }

    Ok(())
}
