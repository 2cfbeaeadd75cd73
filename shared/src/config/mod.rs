//! Configuration for resfs
//!
//! The configuration describes which resource packages, profile directory
//! and extra mounts make up the global file manager, plus logging
//! preferences. It is stored as TOML under the user's config directory.

pub mod paths;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::path::strip_path_prefix;
use crate::logging::{LoggingConfig, VALID_LOG_LEVELS};

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    #[error("Invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("Configuration parsing failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A file manager mounted under a prefix of the global file manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Path prefix, e.g. `pkg/`; empty for the default manager
    #[serde(default)]
    pub prefix: String,

    /// Directory or archive to serve
    pub path: PathBuf,

    /// Create the directory or archive when it does not exist
    #[serde(default)]
    pub create: bool,

    /// Look files up in locale subdirectories
    #[serde(default)]
    pub localized: bool,
}

/// Main resfs configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResfsConfig {
    /// Locale used by localized managers; the system locale when unset
    pub locale: Option<String>,

    /// Writable profile directory; defaults under the data directory
    pub profile_dir: Option<PathBuf>,

    /// Candidate global resource packages, the first usable one wins
    pub resource_paths: Vec<PathBuf>,

    /// Serve the filesystem root under `/`
    pub expose_root: bool,

    /// Additional mounts in lookup order
    pub mounts: Vec<MountConfig>,

    /// Logging preferences
    pub logging: LoggingConfig,
}

impl ResfsConfig {
    /// Default location of the configuration file
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(paths::get_config_directory()?.join(CONFIG_FILE_NAME))
    }

    /// Load the configuration.
    ///
    /// # Arguments
    /// * `path` - Explicit configuration file; `None` uses the default
    ///   location and falls back to defaults when that file is missing
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Ok(default_path) if default_path.exists() => default_path,
                Ok(default_path) => {
                    debug!("No configuration at {:?}, using defaults", default_path);
                    return Ok(Self::default());
                }
                Err(e) => {
                    warn!("Could not locate the configuration directory: {}", e);
                    return Ok(Self::default());
                }
            },
        };

        debug!("Loading configuration from: {:?}", path);
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded successfully from: {:?}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration, creating parent directories as needed
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml_string()?)?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid {
                field: "logging.level".to_string(),
                reason: format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            });
        }

        if matches!(&self.locale, Some(locale) if locale.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "locale".to_string(),
                reason: "must not be empty when set".to_string(),
            });
        }

        for (index, mount) in self.mounts.iter().enumerate() {
            if mount.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("mounts[{index}].path"),
                    reason: "must not be empty".to_string(),
                });
            }
        }

        let defaults = self.mounts.iter().filter(|m| m.prefix.is_empty()).count();
        if defaults > 1 {
            return Err(ConfigError::Invalid {
                field: "mounts".to_string(),
                reason: format!("at most one mount may use an empty prefix, found {defaults}"),
            });
        }

        for (index, mount) in self.mounts.iter().enumerate() {
            if mount.prefix.is_empty() {
                continue;
            }
            for earlier in self.mounts[..index].iter().filter(|m| !m.prefix.is_empty()) {
                if strip_path_prefix(&mount.prefix, &earlier.prefix).is_some() {
                    warn!(
                        "Mount prefix {:?} is shadowed by earlier prefix {:?}",
                        mount.prefix, earlier.prefix
                    );
                }
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Profile directory to use, if one can be determined
    pub fn profile_directory(&self) -> Option<PathBuf> {
        match &self.profile_dir {
            Some(dir) => Some(Self::expand_path(dir)),
            None => paths::get_data_directory()
                .ok()
                .map(|dir| dir.join("profile")),
        }
    }

    /// Expand a leading `~` in a configured path
    pub fn expand_path(path: &Path) -> PathBuf {
        match path.to_str() {
            Some(text) if text.starts_with('~') => {
                paths::expand_home_path(text).unwrap_or_else(|_| path.to_path_buf())
            }
            _ => path.to_path_buf(),
        }
    }
}
