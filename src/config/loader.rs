use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::KnotConfig;

/// Largest accepted `faults.capacity`. Every slot is allocated up front.
pub const MAX_FAULT_CAPACITY: usize = 65_536;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {source}")]
    ParseError {
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl KnotConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Unlike the defaults, an explicit path must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KnotConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError { source: e })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The name is not blank
    /// - The fault channel holds between 1 and [`MAX_FAULT_CAPACITY`] faults
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Knot name must not be empty".to_string(),
            });
        }

        if self.faults.capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "faults.capacity must be greater than zero".to_string(),
            });
        }

        if self.faults.capacity > MAX_FAULT_CAPACITY {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "faults.capacity must be at most {MAX_FAULT_CAPACITY}, got {}",
                    self.faults.capacity
                ),
            });
        }

        Ok(())
    }
}
