//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/ailint/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/ailint/` (~/.config/ailint/)
//! - Data: `$XDG_DATA_HOME/ailint/` (~/.local/share/ailint/)
//! - State/Logs: `$XDG_STATE_HOME/ailint/` (~/.local/state/ailint/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Remote document store (optional; absent means local-only)
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local storage overrides
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when no config file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Path to the config file
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("ailint").join("config.toml")
    }

    /// Directory for persistent data (local history and sessions)
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| xdg_data_home().join("ailint"))
    }

    /// Directory for logs
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("ailint")
    }

    /// Path to the log file
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("ailint.log")
    }
}

/// Remote document-store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    /// Server URL (e.g., `https://store.example.com`); None disables remote
    pub url: Option<String>,

    /// API key sent as a bearer token (optional)
    pub api_key: Option<String>,

    /// Logical database name on the server
    #[serde(default = "default_database")]
    pub database: String,

    /// Request timeout in seconds (also bounds the connect-time ping)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Read a saved document back to verify the insert
    #[serde(default = "default_verify_writes")]
    pub verify_writes: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            database: default_database(),
            timeout_secs: default_timeout_secs(),
            verify_writes: default_verify_writes(),
        }
    }
}

fn default_database() -> String {
    "ailint".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_verify_writes() -> bool {
    true
}

/// Local storage configuration
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Override for the local data directory
    pub data_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
