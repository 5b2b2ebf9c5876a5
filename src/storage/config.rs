//! Storage configuration.
//!
//! Loaded from `config.toml` in the platform data directory; a missing file
//! means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::photos::encoding::DEFAULT_THUMBNAIL_EDGE;
use crate::storage::kv::DEFAULT_QUOTA_BYTES;

/// Where and how the local stores are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// File name of the key-value store inside the data directory
    pub kv_file: String,
    /// File name of the photo blob store inside the data directory
    pub photo_file: String,
    /// Byte quota for the key-value store (0 = unlimited)
    pub kv_quota_bytes: u64,
    /// Longest edge of generated photo thumbnails, in pixels
    pub thumbnail_max_edge: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            kv_file: "local_storage.db".to_string(),
            photo_file: "progress_photos.db".to_string(),
            kv_quota_bytes: DEFAULT_QUOTA_BYTES,
            thumbnail_max_edge: DEFAULT_THUMBNAIL_EDGE,
        }
    }
}

impl StorageConfig {
    /// Defaults rooted at the given directory.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Quota to enforce on the key-value store, if any.
    pub fn kv_quota(&self) -> Option<u64> {
        (self.kv_quota_bytes > 0).then_some(self.kv_quota_bytes)
    }

    pub fn kv_path(&self) -> PathBuf {
        self.data_dir.join(&self.kv_file)
    }

    pub fn photo_path(&self) -> PathBuf {
        self.data_dir.join(&self.photo_file)
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "liftlog", "LiftLog")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load configuration from the default location.
pub fn load_config() -> Result<StorageConfig, ConfigError> {
    load_config_from(&get_config_path(), get_data_dir())
}

/// Load configuration from `path`, rooting the stores at `data_dir`.
pub fn load_config_from(path: &Path, data_dir: PathBuf) -> Result<StorageConfig, ConfigError> {
    if !path.exists() {
        return Ok(StorageConfig::in_dir(data_dir));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: StorageConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = data_dir;

    Ok(config)
}

/// Save configuration to `path`.
pub fn save_config(config: &StorageConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
