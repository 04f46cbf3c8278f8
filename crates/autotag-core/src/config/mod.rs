//! Configuration management for autotag.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section is optional in the file.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Batch processing settings
    pub processing: ProcessingConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Direct-matching encoder settings
    pub embedding: EmbeddingConfig,

    /// Caption-mediated matching settings
    pub caption: CaptionConfig,

    /// Tagging settings
    pub tagging: TaggingConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.autotag.autotag/config.toml
    /// - Linux: ~/.config/autotag/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\autotag\config\config.toml
    ///
    /// Falls back to ~/.autotag/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "autotag", "autotag")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".autotag").join("config.toml")
            })
    }

    /// Resolved model directory (with ~ expansion).
    pub fn model_dir(&self) -> PathBuf {
        expand(&self.general.model_dir)
    }

    /// Resolved pool cache directory (with ~ expansion).
    pub fn cache_dir(&self) -> PathBuf {
        expand(&self.general.cache_dir)
    }

    /// Directory holding the direct-matching CLIP model files.
    pub fn embedding_model_dir(&self) -> PathBuf {
        self.model_dir().join(&self.embedding.model)
    }

    /// Directory holding the caption sentence encoder files.
    pub fn sentence_model_dir(&self) -> PathBuf {
        self.model_dir().join(&self.caption.sentence_model)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
