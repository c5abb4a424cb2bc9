use crate::{Error, FileStorageAdapter, KeyStore, Result};
use consult_dm::DECRYPT_FAILURE_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What happens to the local key pair between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPersistence {
    /// Fresh key pair every time a conversation opens.
    #[default]
    Ephemeral,
    /// Key pair stored in the data directory and reused.
    Persistent,
}

/// Conversation channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub key_persistence: KeyPersistence,

    /// Shown in place of a message that cannot be decrypted
    #[serde(default = "default_placeholder")]
    pub decrypt_failure_placeholder: String,

    /// Path to the config file
    #[serde(skip)]
    pub path: PathBuf,
}

fn default_placeholder() -> String {
    DECRYPT_FAILURE_PLACEHOLDER.to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            key_persistence: KeyPersistence::default(),
            decrypt_failure_placeholder: default_placeholder(),
            path: PathBuf::new(),
        }
    }
}

/// Platform data directory for this library, e.g. `~/.local/share/consult-dm`.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("consult-dm"))
        .ok_or_else(|| Error::Config("Could not find data directory".to_string()))
}

impl ChannelConfig {
    /// Load config from the data directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_path = data_dir.join("config.json");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
            let mut config: ChannelConfig = serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
            config.path = config_path;
            Ok(config)
        } else {
            Ok(ChannelConfig {
                path: config_path,
                ..Default::default()
            })
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    pub fn set_key_persistence(&mut self, persistence: KeyPersistence) -> Result<()> {
        self.key_persistence = persistence;
        self.save()
    }

    /// Key store under `<data_dir>/keys` when persistence is enabled.
    pub fn open_key_store(&self) -> Result<Option<KeyStore>> {
        if self.key_persistence != KeyPersistence::Persistent {
            return Ok(None);
        }
        let data_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => default_data_dir()?,
        };
        let storage = FileStorageAdapter::new(data_dir.join("keys"))?;
        Ok(Some(KeyStore::new(Arc::new(storage))))
    }
}
