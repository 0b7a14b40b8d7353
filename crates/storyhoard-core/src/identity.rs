//! Device identity
//!
//! Every story records the device that authored it. A story is "own" when
//! that device id matches this device, and a cached copy otherwise.
//!
//! The id is generated on first run and kept in `{data_dir}/device_id`.
//! `Config::device_id` overrides the stored value.

use std::fmt;
use std::fs;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::storage::images::atomic_write;

/// Ownership discriminator embedded in every story
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random device id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the device id for a configuration
pub struct Identity {
    config: Config,
}

impl Identity {
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Whether a device id has been stored yet
    pub fn is_initialized(&self) -> bool {
        self.config.device_id_path().exists()
    }

    /// Read the stored device id, if any
    pub fn stored_id(&self) -> Result<Option<DeviceId>> {
        let path = self.config.device_id_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read device id from {:?}", path))?;
        let id = content.trim();
        if id.is_empty() {
            anyhow::bail!("Device id file {:?} is empty", path);
        }
        Ok(Some(DeviceId::new(id)))
    }

    /// Resolve the device id, generating and storing one on first run
    pub fn load_or_create(&self) -> Result<DeviceId> {
        if let Some(ref id) = self.config.device_id {
            return Ok(DeviceId::new(id.clone()));
        }

        if let Some(id) = self.stored_id()? {
            return Ok(id);
        }

        let id = DeviceId::generate();
        let path = self.config.device_id_path();
        atomic_write(&path, id.as_str().as_bytes())
            .with_context(|| format!("Failed to save device id to {:?}", path))?;
        info!("Generated device id {}", id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_not_initialized_initially() {
        let temp_dir = TempDir::new().unwrap();
        let identity = Identity::with_config(test_config(&temp_dir));

        assert!(!identity.is_initialized());
        assert!(identity.stored_id().unwrap().is_none());
    }

    #[test]
    fn test_load_or_create_persists() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let first = Identity::with_config(config.clone()).load_or_create().unwrap();
        assert!(Identity::with_config(config.clone()).is_initialized());

        // Simulates restart
        let second = Identity::with_config(config).load_or_create().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_config_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        Identity::with_config(config.clone()).load_or_create().unwrap();

        config.device_id = Some("phone-42".to_string());
        let id = Identity::with_config(config).load_or_create().unwrap();
        assert_eq!(id.as_str(), "phone-42");
    }

    #[test]
    fn test_empty_id_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        fs::write(config.device_id_path(), "  \n").unwrap();

        let result = Identity::with_config(config).stored_id();
        assert!(result.unwrap_err().to_string().contains("empty"));
    }
}
