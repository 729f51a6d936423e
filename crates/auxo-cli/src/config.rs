//! Config file loading.
//!
//! The loader never fails: a missing or broken file falls back to defaults.
//! It runs before tracing is installed (the file picks the log level), so it
//! returns where the config came from and `main` logs that afterwards.

use auxo_types::config::AuxoConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of [`load_config`].
#[derive(Debug)]
pub enum ConfigSource {
    Loaded(PathBuf),
    Missing(PathBuf),
    Invalid { path: PathBuf, error: String },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => info!(path = %path.display(), "Loaded configuration"),
            Self::Missing(path) => {
                info!(path = %path.display(), "Config file not found, using defaults")
            }
            Self::Invalid { path, error } => warn!(
                error = %error,
                path = %path.display(),
                "Failed to load config, using defaults"
            ),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".auxo")
        .join("config.toml")
}

/// Load `path`, or `~/.auxo/config.toml` when none is given.
pub fn load_config(path: Option<&Path>) -> (AuxoConfig, ConfigSource) {
    let config_path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if !config_path.exists() {
        return (AuxoConfig::default(), ConfigSource::Missing(config_path));
    }

    let parsed = std::fs::read_to_string(&config_path)
        .map_err(|e| e.to_string())
        .and_then(|contents| toml::from_str::<AuxoConfig>(&contents).map_err(|e| e.to_string()));

    match parsed {
        Ok(config) => (config, ConfigSource::Loaded(config_path)),
        Err(error) => (
            AuxoConfig::default(),
            ConfigSource::Invalid {
                path: config_path,
                error,
            },
        ),
    }
}
