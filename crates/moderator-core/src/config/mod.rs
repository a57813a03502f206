//! Configuration management for the moderator.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment overrides (the variables the deployment already sets).
//! All config structs implement `Default` with the strict moderation profile.

mod env;
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
    /// Work queue and result channel
    pub queue: QueueConfig,

    /// Face detection (service + fallback cascade)
    pub face: FaceConfig,

    /// Explicit-content classifier
    pub nsfw: NsfwConfig,

    /// Decision thresholds
    pub policy: PolicyConfig,

    /// Batch processing
    pub processing: ProcessingConfig,

    /// Resource limits and timeouts
    pub limits: LimitsConfig,

    /// Object storage (download collaborator)
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides.
    ///
    /// Falls back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/app.lomi.moderator/config.toml
    /// - Linux: ~/.config/moderator/config.toml
    ///
    /// Falls back to ~/.moderator/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("app", "lomi", "moderator")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".moderator").join("config.toml")
            })
    }

    /// Resolved path of the NSFW classifier (with ~ expansion).
    pub fn nsfw_model_path(&self) -> PathBuf {
        expand(&self.nsfw.model_path)
    }

    /// Resolved path of the fallback face cascade (with ~ expansion).
    pub fn cascade_model_path(&self) -> PathBuf {
        expand(&self.face.cascade_model)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
