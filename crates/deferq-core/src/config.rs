//! Store configuration (TOML).
//!
//! ```toml
//! max_attempts = 3
//! interval_secs = 3
//!
//! [backend]
//! kind = "sqlite"      # or "files"
//! path = "/var/lib/deferq/tasks.db"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::RetryBudget;

/// Which backend holds the tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// `path` is the base directory; tasks live under `path/tasks`.
    Files { path: PathBuf },
    /// `path` is the database file.
    Sqlite { path: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Files {
            path: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_attempts: u32,
    /// Pause between two runs of a pass, in seconds (at least 1).
    pub interval_secs: u64,
    pub backend: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryBudget::DEFAULT_MAX_ATTEMPTS,
            interval_secs: 3,
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl StoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    /// `ConfigError::Read` if the file cannot be read, `ConfigError::Parse`
    /// if it is not valid TOML for this structure.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}
