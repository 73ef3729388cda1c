//! Configuration file handling for backdrop.
//!
//! Settings live in `config.toml` under the platform config directory
//! (`~/.config/backdrop` on Linux). Each mode has its own table of
//! overrides that is merged over that mode's preset.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use backdrop_core::{ConfigError, ConfigPatch, EngineConfig, RendererKind};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";

/// Errors raised while reading or writing the config file.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid {mode} settings: {source}")]
    Invalid {
        mode: &'static str,
        #[source]
        source: ConfigError,
    },
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Mode to start in.
    pub mode: RendererKind,
    /// Overrides the host's reduced-motion preference when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduced_motion: Option<bool>,
    pub bubbles: ConfigPatch,
    pub particles: ConfigPatch,
    pub points: ConfigPatch,
}

impl Config {
    /// Default location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "backdrop").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigFileError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml_str(&contents)
    }

    /// Parse and validate every mode's settings.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigFileError> {
        let config: Config = toml::from_str(contents)?;
        for mode in [RendererKind::Bubbles, RendererKind::Particles, RendererKind::Points] {
            config
                .engine_config(mode)
                .map_err(|source| ConfigFileError::Invalid {
                    mode: mode.name(),
                    source,
                })?;
        }
        Ok(config)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let io_err = |source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(io_err)
    }

    /// Overrides for one mode.
    pub fn patch_for(&self, mode: RendererKind) -> &ConfigPatch {
        match mode {
            RendererKind::Bubbles => &self.bubbles,
            RendererKind::Particles => &self.particles,
            RendererKind::Points => &self.points,
        }
    }

    /// The mode's preset with its overrides and the reduced-motion
    /// override applied.
    pub fn engine_config(&self, mode: RendererKind) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig::preset(mode).patched(self.patch_for(mode))?;
        if self.reduced_motion.is_some() {
            config.reduced_motion = self.reduced_motion;
        }
        Ok(config)
    }
}
