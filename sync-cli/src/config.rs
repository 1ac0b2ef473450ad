//! Configuration loading for lanchat.
//!
//! Configuration is loaded from a TOML file (default: `lanchat.toml` in the
//! data directory). Every section and field is optional.

use lanchat_sync_client::{SessionConfig, DEFAULT_UPDATE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE_NAME: &str = "lanchat.toml";

/// Root configuration for lanchat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identity used when bootstrapping a session.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Session tuning.
    #[serde(default)]
    pub session: SessionSection,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Unique username (default: "anonymous").
    #[serde(default = "default_username")]
    pub username: String,
    /// Name shown to peers (default: "Anonymous").
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSection {
    /// Background snapshot refresh period in seconds (default: 0 = disabled).
    #[serde(default)]
    pub refresh_interval_secs: u64,
    /// Capacity of the change broadcast (default: 256).
    #[serde(default = "default_update_capacity")]
    pub update_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG` (default: "warn").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_username() -> String {
    "anonymous".to_string()
}

fn default_display_name() -> String {
    "Anonymous".to_string()
}

fn default_update_capacity() -> usize {
    DEFAULT_UPDATE_CAPACITY
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            display_name: default_display_name(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 0,
            update_capacity: default_update_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load configuration from a TOML file, or the defaults if it does not
    /// exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Session configuration for the client library.
    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::new().with_update_capacity(self.session.update_capacity);
        match self.session.refresh_interval_secs {
            0 => config,
            secs => config.with_refresh_interval(Duration::from_secs(secs)),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to write configuration file.
    #[error("failed to write config file {path}: {source}")]
    WriteError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to serialize configuration.
    #[error("failed to serialize config: {0}")]
    SerializeError(toml::ser::Error),
}
