//! Session configuration.
//!
//! ```toml
//! seed = 42
//! duration_tracking = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seeds the session RNG used for shuffling and `random`. Absent means
    /// seeded from entropy.
    pub seed: Option<u64>,
    /// Whether time-dependent items get the built-in `duration` variable.
    pub duration_tracking: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            seed: None,
            duration_tracking: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid session config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// A deterministic configuration.
    pub fn seeded(seed: u64) -> Self {
        SessionConfig {
            seed: Some(seed),
            ..Self::default()
        }
    }
}
