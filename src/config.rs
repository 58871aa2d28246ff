use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub(crate) const READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub const DEFAULT_TARGET_COMMUNITIES: usize = 1;

/// Options of the greedy merge loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectConfig {
    /// Stop merging once this many communities remain.
    pub target_communities: usize,
}

impl Default for DetectConfig {
    fn default() -> Self {
        DetectConfig {
            target_communities: DEFAULT_TARGET_COMMUNITIES,
        }
    }
}

/// Configuration file of the command-line tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub detection: DetectConfig,
    /// Append logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_yaml_str(content: &str) -> Result<AppConfig> {
        serde_yaml::from_str(content).context("invalid configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}
