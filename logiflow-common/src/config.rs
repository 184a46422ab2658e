//! Bootstrap configuration
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority, may itself come from an
//!    environment variable via clap)
//! 2. TOML config file
//! 3. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is normal; a malformed one is an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Interface to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Per-actor request quota for mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained rate
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Requests allowed back-to-back before throttling
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Interval between sweeps of idle keys
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_requests_per_minute() -> u32 {
    120
}

fn default_burst() -> u32 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration
    ///
    /// With an explicit path the file must exist. Without one, the platform
    /// config file is used when present, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Database path: CLI argument, then TOML, then platform default
    pub fn resolve_database_path(&self, cli_arg: Option<PathBuf>) -> PathBuf {
        cli_arg
            .or_else(|| self.database_path.clone())
            .unwrap_or_else(default_database_path)
    }
}

/// `<config_dir>/logiflow/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("logiflow").join("config.toml"))
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("logiflow"))
        .unwrap_or_else(|| PathBuf::from("./logiflow_data"))
        .join("logiflow.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rate_limit.burst, 30);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 8080
            database_path = "/srv/logiflow/db.sqlite"

            [rate_limit]
            requests_per_minute = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit.requests_per_minute, 10);
        assert_eq!(config.rate_limit.burst, 30);
        assert_eq!(
            config.resolve_database_path(None),
            PathBuf::from("/srv/logiflow/db.sqlite")
        );
    }

    #[test]
    fn test_cli_path_wins() {
        let config = TomlConfig {
            database_path: Some(PathBuf::from("/from/toml.db")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_database_path(Some(PathBuf::from("/from/cli.db"))),
            PathBuf::from("/from/cli.db")
        );
    }

    #[test]
    fn test_default_database_path_is_named() {
        assert!(default_database_path().ends_with("logiflow.db"));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = TomlConfig::load(Some(Path::new("/nonexistent/logiflow.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
