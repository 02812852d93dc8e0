//! Configuration file loading

use super::schema::Config;
use super::validator::ConfigValidator;
use crate::error::{AllowlistError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        // Priority order:
        // 1. $ATLAS_ALLOWLIST_CONFIG
        // 2. $XDG_CONFIG_HOME/atlas-allowlist/config.toml
        // 3. ~/.config/atlas-allowlist/config.toml

        if let Ok(path) = env::var("ATLAS_ALLOWLIST_CONFIG") {
            return PathBuf::from(path);
        }

        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("atlas-allowlist/config.toml");
        }

        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(".config/atlas-allowlist/config.toml");
        }

        PathBuf::from("config.toml")
    }

    /// Load config from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| AllowlistError::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&contents)
    }

    /// Parse and validate config text
    pub fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load config with fallback to defaults
    pub fn load() -> Result<Config> {
        let path = Self::default_config_path();

        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Load config from an explicit path, or the default location
    /// Priority: Explicit path > Default path > Built-in defaults
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Config> {
        match path {
            Some(p) => Self::load_from_file(&p),
            None => Self::load(),
        }
    }
}
