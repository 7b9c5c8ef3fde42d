//! Client configuration
//!
//! Configuration for reaching the chat backend, loaded with the priority
//! (highest first): environment variables, TOML config file, built-in
//! defaults.
//!
//! # Environment Variables
//!
//! - `NOVA_API_URL`: Base URL of the backend (default `http://localhost:8000`)
//! - `NOVA_CONNECT_TIMEOUT_MS`: Connect timeout in milliseconds
//!
//! # Config File
//!
//! XDG Base Directory compliant: `$XDG_CONFIG_HOME/nova/client.toml`
//! (typically `~/.config/nova/client.toml`).
//!
//! ```toml
//! base_url = "http://localhost:8000"
//! connect_timeout_ms = 10000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read config file at {path}: {source}")]
    Read {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse the TOML
    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk shape of the config file; every field optional
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ClientToml {
    base_url: Option<String>,
    connect_timeout_ms: Option<u64>,
}

/// Resolved client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the chat backend
    pub base_url: String,
    /// TCP connect timeout; streaming requests carry no total timeout
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Default config file path under the XDG config directory
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nova").join("client.toml"))
    }

    /// Load configuration: defaults, then the default config file if present,
    /// then environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = Self::default_path() {
            if path.exists() {
                config = Self::from_file(&path)?;
            }
        }
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific TOML file (plus env overrides)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ClientToml = toml::from_str(&raw)?;

        let mut config = Self::default();
        if let Some(base_url) = file.base_url {
            config.base_url = base_url;
        }
        if let Some(ms) = file.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Apply environment variable overrides in place
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("NOVA_API_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(ms) = std::env::var("NOVA_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.connect_timeout = Duration::from_millis(ms);
            }
        }
    }
}
