//! Configuration loading for sync-host.
//!
//! Configuration is loaded from a TOML file (default: `syncpad.toml`). Every
//! section and field is optional.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for sync-host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Change tracking configuration.
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// File watching configuration (used by the `syncpad host` command).
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the TCP listener (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Change tracking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Broadcast window in milliseconds (default: 500).
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Pending transactions that force an immediate flush (default: 1000).
    #[serde(default = "default_max_pending_transactions")]
    pub max_pending_transactions: usize,
}

/// File watching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Poll interval in milliseconds (default: 250).
    #[serde(default = "default_watch_interval_ms")]
    pub interval_ms: u64,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_throttle_ms() -> u64 {
    500
}

fn default_max_pending_transactions() -> usize {
    1000
}

fn default_watch_interval_ms() -> u64 {
    250
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            max_pending_transactions: default_max_pending_transactions(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_watch_interval_ms(),
        }
    }
}

impl TrackerConfig {
    /// Broadcast window as a [`Duration`].
    pub fn throttle_delay(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl WatchConfig {
    /// Poll interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
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
}
