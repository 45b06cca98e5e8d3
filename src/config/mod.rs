//! Settings for the alertconf tool itself
//!
//! Handles TOML settings file parsing and CLI argument merging. These
//! settings are separate from the alert configuration being loaded.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Alert configuration location
    pub conf: ConfConfig,
    /// Notification transport settings
    pub notify: NotifyConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,
}

/// Where to find the alert configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfConfig {
    /// Path of the alert configuration file
    pub path: PathBuf,
}

impl Default for ConfConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bosun.conf"),
        }
    }
}

/// Notification transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    /// Timeout for POST and GET requests in seconds
    pub http_timeout_secs: u64,
    /// Timeout for SMTP connections in seconds
    pub smtp_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 10,
            smtp_timeout_secs: 30,
        }
    }
}

impl NotifyConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }
}

impl Config {
    /// Check values that deserialize fine but make no sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notify.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "notify.http_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.notify.smtp_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "notify.smtp_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.conf.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "conf.path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
