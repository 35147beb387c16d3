//! Engine configuration
//!
//! Loaded from a JSON file. Only `data_dir` is required.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;
use crate::storage::is_identifier;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory; one subdirectory per database holds its index files
    pub data_dir: String,

    /// Database a new session starts in
    #[serde(default = "default_db")]
    pub default_db: String,

    /// Minimum log severity: trace, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Flush the session database's indexes after every commit
    #[serde(default)]
    pub sync_on_commit: bool,
}

fn default_db() -> String {
    "sys".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Reads, parses and validates the config file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".to_string()));
        }
        if !is_identifier(&self.default_db) {
            return Err(ConfigError::Invalid(format!(
                "default_db '{}' is not a plain identifier",
                self.default_db
            )));
        }
        self.log_severity()?;
        Ok(())
    }

    pub fn log_severity(&self) -> Result<Severity, ConfigError> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }
}
