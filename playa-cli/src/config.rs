//! Configuration loading for playa.
//!
//! Configuration is loaded from a TOML file (default: `<data-dir>/playa.toml`).
//! Every section and field is optional.

use anyhow::{Context, Result};
use playa_core::EventConfig;
use playa_types::{DeviceId, DEFAULT_MAX_STORAGE_BYTES};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the data directory.
pub const CONFIG_FILE: &str = "playa.toml";

const DEVICE_ID_FILE: &str = "device_id";

/// Root configuration for playa.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Event calendar and geofence.
    #[serde(default)]
    pub event: EventConfig,
    /// On-device storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Content catalog.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Unlock gate.
    #[serde(default)]
    pub unlock: UnlockConfig,
}

/// Device identity configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfig {
    /// Fixed device id (generated and saved in the data dir if unset).
    pub id: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite state database, relative to the data dir (default: state.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Package directory, relative to the data dir (default: packages).
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,
    /// Storage budget in bytes (default: 2 GB).
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,
}

/// Catalog configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Directory holding `catalog.json` and package files.
    pub catalog_dir: Option<PathBuf>,
    /// Package ids to request regardless of priority.
    #[serde(default)]
    pub priority_packages: Vec<String>,
}

/// Unlock configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnlockConfig {
    /// Debug bypass: report unlocked without persisting (default: false).
    #[serde(default)]
    pub bypass: bool,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("state.db")
}

fn default_packages_dir() -> PathBuf {
    PathBuf::from("packages")
}

fn default_capacity_bytes() -> u64 {
    DEFAULT_MAX_STORAGE_BYTES
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            packages_dir: default_packages_dir(),
            capacity_bytes: default_capacity_bytes(),
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

    /// Load `explicit` if given, else `<data_dir>/playa.toml` if present,
    /// else defaults.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let path = data_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
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
}

/// Device id from the config, or the one saved in the data dir, or a new
/// one that is then saved.
pub async fn resolve_device_id(config: &DeviceConfig, data_dir: &Path) -> Result<DeviceId> {
    if let Some(id) = &config.id {
        return Ok(DeviceId::new(id.clone()));
    }

    let path = data_dir.join(DEVICE_ID_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) if !contents.trim().is_empty() => Ok(DeviceId::new(contents.trim())),
        _ => {
            let id = DeviceId::random();
            tokio::fs::write(&path, id.as_str())
                .await
                .context("Failed to save device id")?;
            Ok(id)
        }
    }
}
