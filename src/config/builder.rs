//! Settings builder
//!
//! Merges settings from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Builder for merging settings sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load settings from a file
    ///
    /// An explicitly named file must load; without one the default
    /// locations are tried and a missing file is not an error.
    pub fn with_file(mut self, path: Option<&str>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default(),
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Override with CLI verbose flag
    pub fn with_verbose(mut self, verbose: Option<bool>) -> Self {
        if let Some(v) = verbose {
            self.config.general.verbose = v;
        }
        self
    }

    /// Override with CLI alert configuration path
    pub fn with_conf_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.config.conf.path = p;
        }
        self
    }

    /// Override with CLI HTTP timeout
    pub fn with_http_timeout(mut self, secs: Option<u64>) -> Self {
        if let Some(s) = secs {
            self.config.notify.http_timeout_secs = s;
        }
        self
    }

    /// Build the final settings
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
