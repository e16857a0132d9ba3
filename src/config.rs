use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::catalog::{FormatDefinition, DEFAULT_FORMAT};
use crate::cues::{CueConfig, DEFAULT_WARNING_SECONDS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_format: String,
    pub warning_seconds: Option<u32>,
    pub bell: bool,
    /// Extra format definitions, a JSON array of formats.
    pub formats_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_format: DEFAULT_FORMAT.to_string(),
            warning_seconds: Some(DEFAULT_WARNING_SECONDS),
            bell: true,
            formats_file: None,
        }
    }
}

impl Config {
    pub fn cue_config(&self) -> CueConfig {
        CueConfig {
            warning_seconds: self.warning_seconds,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

/// Reads user-defined formats. Every definition is validated on load.
pub fn load_formats_file(path: &Path) -> io::Result<Vec<FormatDefinition>> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
