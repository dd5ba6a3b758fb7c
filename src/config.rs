//! Configuration loading and management
//!
//! Handles parsing of `progress.toml` in the data directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::codec::EXPORT_FILE_NAME;
use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::notifier::DEFAULT_DEBOUNCE_MS;
use crate::store::DEFAULT_KEY;

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "progress.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub reset: ResetConfig,
}

/// Where and how the collection is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Medium key; also the stem of the data file
    #[serde(default = "default_key")]
    pub key: String,

    /// How long to wait for the data file lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// File name used by `progress export` without `--out`
    #[serde(default = "default_export_file_name")]
    pub file_name: String,
}

fn default_export_file_name() -> String {
    EXPORT_FILE_NAME.to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: default_export_file_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period before a burst of file events is reported
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetConfig {
    /// Phrase that must be typed to reset everything
    #[serde(default = "default_confirm_phrase")]
    pub confirm_phrase: String,
}

fn default_confirm_phrase() -> String {
    "RESET".to_string()
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            confirm_phrase: default_confirm_phrase(),
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `progress.toml` from the data directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let key = self.storage.key.as_str();
        if key.is_empty() {
            return Err(Error::InvalidConfig("storage.key cannot be empty".to_string()));
        }
        if !key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        {
            return Err(Error::InvalidConfig(format!(
                "storage.key '{key}' may only contain letters, digits, '-', '_' and '.'"
            )));
        }
        if self.storage.lock_timeout_ms == 0 || self.storage.lock_timeout_ms > 60_000 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be between 1 and 60000".to_string(),
            ));
        }

        let file_name = self.export.file_name.trim();
        if file_name.is_empty() {
            return Err(Error::InvalidConfig("export.file_name cannot be empty".to_string()));
        }
        if file_name.contains('/') || file_name.contains('\\') {
            return Err(Error::InvalidConfig(format!(
                "export.file_name '{file_name}' must not contain path separators"
            )));
        }

        if self.watch.debounce_ms > 10_000 {
            return Err(Error::InvalidConfig(
                "watch.debounce_ms must be <= 10000".to_string(),
            ));
        }

        if self.reset.confirm_phrase.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "reset.confirm_phrase cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
