//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/storyhoard/config.toml)
//! 3. Environment variables (STORYHOARD_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable prefix
const ENV_PREFIX: &str = "STORYHOARD";

/// Default index prefix on the publishing server
pub const DEFAULT_SERVER_INDEX: &str = "storyhoard";

/// Default remote request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 10;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, images, device id)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Publishing server base URL (optional; publishing is off without it)
    #[serde(default)]
    pub server_url: Option<String>,

    /// Index prefix for the server's document collections
    #[serde(default = "default_server_index")]
    pub server_index: String,

    /// Override for the generated device id
    #[serde(default)]
    pub device_id: Option<String>,

    /// Timeout for each remote request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Log file path (stderr if unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server_url: None,
            server_index: default_server_index(),
            device_id: None,
            request_timeout_secs: default_request_timeout(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (STORYHOARD_DATA_DIR, STORYHOARD_SERVER_URL, ...)
    /// 2. Config file (~/.config/storyhoard/config.toml or STORYHOARD_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// An empty value clears optional settings and is ignored for required ones.
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_override("DATA_DIR") {
            self.data_dir = PathBuf::from(val);
        }
        if let Some(val) = env_override("SERVER_URL") {
            self.server_url = non_empty(val);
        }
        if let Some(val) = env_override("SERVER_INDEX").and_then(non_empty) {
            self.server_index = val;
        }
        if let Some(val) = env_override("DEVICE_ID") {
            self.device_id = non_empty(val);
        }
        match env_override("REQUEST_TIMEOUT").map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => self.request_timeout_secs = secs,
            Some(_) => warn!("Ignoring invalid {}_REQUEST_TIMEOUT", ENV_PREFIX),
            None => {}
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration as TOML at `path`, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Timeout applied to every request to the publishing server
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the config file path
    ///
    /// Can be overridden with STORYHOARD_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("storyhoard")
            .join("config.toml")
    }

    /// Whether a publishing server is configured
    pub fn publishing_enabled(&self) -> bool {
        self.server_url.is_some()
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("storyhoard.db")
    }

    /// Get the directory holding media image files
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Get the path to the device id file
    pub fn device_id_path(&self) -> PathBuf {
        self.data_dir.join("device_id")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storyhoard")
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

fn default_server_index() -> String {
    DEFAULT_SERVER_INDEX.to_string()
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}
