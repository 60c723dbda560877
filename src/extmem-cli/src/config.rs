//! Configuration management for the extmem CLI

use anyhow::{Context, Result};
use extmem::{ArrayOptions, PointerWidth};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Maximum characters decoded from text fields
    pub max_text_len: Option<usize>,
    /// Default pointer width for dumps
    pub pointer_width: Option<PointerWidth>,
    /// Defaults for the `array` command
    pub array: ArrayOptions,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("extmem");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Pointer width from the command line, the config, or 64-bit
    pub fn pointer_width(&self, arg: Option<PointerWidth>) -> PointerWidth {
        arg.or(self.pointer_width).unwrap_or_default()
    }

    /// Push process-wide settings into the library
    pub fn apply(&self) {
        if let Some(len) = self.max_text_len {
            extmem::config::set_max_text_len(len);
        }
    }
}
