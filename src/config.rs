//! YAML configuration file support for the `pharmacien` CLI.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "local setup"
//!
//! store:
//!   backend:
//!     kind: redb
//!     path: "data/pharmacien.redb"
//!   compression:
//!     codec: zstd
//!     level: 3
//!   vector_index:
//!     enabled: true
//!     ef_search: 64
//!
//! embedder:
//!   mode: "hash"
//!   model_name: "feature-hash-v1"
//!   dimension: 384
//!
//! dataset:
//!   seed: 42
//!   documents: 100
//!   images: 50
//!
//! backfill:
//!   batch_size: 32
//! ```

use std::fs;
use std::path::Path;

use embed::EmbedConfig;
use serde::{Deserialize, Serialize};
use store::{BackendConfig, StoreConfig};
use thiserror::Error;

use crate::dataset::DatasetConfig;
use crate::pipeline::BackfillConfig;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration for the CLI jobs and the `serve` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PharmacienConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Store opened by every command. Defaults to a redb file so that
    /// separate invocations share data.
    #[serde(default = "default_store")]
    pub store: StoreConfig,

    #[serde(default)]
    pub embedder: EmbedConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub backfill: BackfillConfig,
}

impl PharmacienConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PharmacienConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        if let BackendConfig::Redb { path } = &self.store.backend {
            if path.trim().is_empty() {
                return Err(ConfigLoadError::Validation(
                    "store.backend.path must not be empty".to_string(),
                ));
            }
        }
        let index = &self.store.vector_index;
        if index.enabled && (index.m == 0 || index.ef_search == 0) {
            return Err(ConfigLoadError::Validation(
                "store.vector_index.m and ef_search must be >= 1".to_string(),
            ));
        }

        if self.embedder.dimension == 0 {
            return Err(ConfigLoadError::Validation(
                "embedder.dimension must be >= 1".to_string(),
            ));
        }
        match self.embedder.mode.as_str() {
            "hash" | "fast" => {}
            "api" => {
                if self.embedder.api_url.is_none() {
                    return Err(ConfigLoadError::Validation(
                        "embedder.api_url is required when mode is 'api'".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "embedder.mode must be 'hash' or 'api', got '{other}'"
                )));
            }
        }

        if self.backfill.batch_size == 0 {
            return Err(ConfigLoadError::Validation(
                "backfill.batch_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PharmacienConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: None,
            store: default_store(),
            embedder: EmbedConfig::default(),
            dataset: DatasetConfig::default(),
            backfill: BackfillConfig::default(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_store() -> StoreConfig {
    StoreConfig::default().with_backend(BackendConfig::redb("data/pharmacien.redb"))
}
