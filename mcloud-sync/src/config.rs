use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_TARGET_DIR: &str = "/app_data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// The on-disk JSON config. `authorization` is rewritten in place after a
/// successful credential refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub authorization: String,
    #[serde(rename = "cloudID")]
    pub cloud_id: String,
    #[serde(rename = "catalogID")]
    pub catalog_id: String,
    pub account: String,
    #[serde(rename = "targetDir", default = "default_target_dir")]
    pub target_dir: PathBuf,
    /// Whether remote create times are read as UTC. The gateway does not
    /// document the zone; flip this if mirrored mtimes are off by a fixed
    /// offset.
    #[serde(rename = "createTimeUtc", default = "default_true")]
    pub create_time_utc: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

fn default_target_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TARGET_DIR)
}

fn default_true() -> bool {
    true
}
