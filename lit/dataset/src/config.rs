use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use shared_logging::LogLevel;

/// Settings for dataset persistence and logging, usually read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding additional `*.lit.json` datapoint files.
    #[serde(default = "default_datapoints_dir")]
    pub datapoints_dir: PathBuf,
    /// JSON-lines log file; logging goes only to `tracing` when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Minimum level written to `log_path`.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Pretty-print serialized datapoints.
    #[serde(default)]
    pub pretty_json: bool,
}

fn default_datapoints_dir() -> PathBuf {
    PathBuf::from("./datapoints")
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            datapoints_dir: default_datapoints_dir(),
            log_path: None,
            log_level: LogLevel::default(),
            pretty_json: false,
        }
    }
}

impl DatasetConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Relative paths are resolved against the directory of the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading dataset config {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config.resolved_against(&source_dir))
    }

    /// Parses configuration from TOML text without resolving paths.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn resolved_against(mut self, dir: &Path) -> Self {
        if self.datapoints_dir.is_relative() {
            self.datapoints_dir = dir.join(&self.datapoints_dir);
        }
        if let Some(log_path) = self.log_path.as_mut() {
            if log_path.is_relative() {
                *log_path = dir.join(&*log_path);
            }
        }
        self
    }
}
