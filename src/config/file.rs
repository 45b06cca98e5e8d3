//! Settings file loading
//!
//! Handles loading settings from TOML files.

use crate::config::Config;
use crate::error::ConfigError;

use std::path::{Path, PathBuf};

/// Settings file handler
pub struct ConfigFile;

impl ConfigFile {
    /// Load settings from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from the first default location that parses
    pub fn load_default() -> Option<Config> {
        for path in Self::default_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    log::info!("Loaded settings from {}", path.display());
                    return Some(config);
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }
        None
    }

    /// Get default settings file paths, lowest priority first
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System-wide settings
        paths.push(PathBuf::from("/etc/alertconf/config.toml"));

        // User settings
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("alertconf/config.toml"));
        }

        // Current directory
        paths.push(PathBuf::from("alertconf.toml"));
        paths.push(PathBuf::from(".alertconf.toml"));

        paths
    }
}
