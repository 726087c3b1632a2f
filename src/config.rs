use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming the JSON config file
pub const CONFIG_ENV: &str = "CHORDCOACH_HW_CONFIG";

/// Returns the config file path from `CHORDCOACH_HW_CONFIG`, if set
fn config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV).map(PathBuf::from)
}

/// Hardware layer settings.
///
/// Read-only: loaded at startup, never written back. Fields use
/// `#[serde(default)]` so a partial file only overrides what it names.
/// Audio stream parameters are fixed and deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Client name registered with the MIDI driver
    pub midi_client_name: String,

    /// env_logger filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            midi_client_name: "ChordCoach".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl HardwareConfig {
    /// Read the file named by `CHORDCOACH_HW_CONFIG`.
    ///
    /// `Ok(None)` when the variable is unset. Nothing is logged here:
    /// callers usually load the config before logging is up.
    pub fn from_env() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        let config = Self::read(&path)?;
        Ok(Some((path, config)))
    }

    /// Read and parse a config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}
