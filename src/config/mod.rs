//! Configuration management
//!
//! Handles loading and validation of the filter configuration from TOML files,
//! and turns it into ready-to-use translation settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::input::{
    FilterSettings, HeaderLayout, PointerStateTracker, ScanCodeMap, ScanCodeTranslator, MAP_LEN,
    SENTINEL,
};

pub mod types;

pub use types::{KeyboardConfig, LoggingConfig, MouseConfig, RemapEntry};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Keyboard configuration
    #[serde(default)]
    pub keyboard: KeyboardConfig,
    /// Mouse configuration
    #[serde(default)]
    pub mouse: MouseConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Create default configuration
    pub fn default_config() -> Result<Self> {
        Ok(Config {
            keyboard: KeyboardConfig::default(),
            mouse: MouseConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.mouse.absolute_divisor <= 0 {
            anyhow::bail!(
                "absolute_divisor must be positive, got {}",
                self.mouse.absolute_divisor
            );
        }

        for entry in &self.keyboard.remap {
            if entry.from as usize >= MAP_LEN {
                anyhow::bail!("Remap source 0x{:X} is not a 9-bit scan code", entry.from);
            }
            if entry.to != SENTINEL && entry.to as usize >= MAP_LEN {
                anyhow::bail!("Remap target 0x{:X} is not a 9-bit scan code", entry.to);
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    /// Build the scan code table: registry dump first, then inline overrides
    pub fn scancode_map(&self) -> Result<ScanCodeMap> {
        let mut map = match &self.keyboard.scancode_map_file {
            Some(path) => ScanCodeMap::load_registry_file(path)
                .context(format!("Failed to load scancode map: {}", path.display()))?,
            None => ScanCodeMap::identity(),
        };

        for entry in &self.keyboard.remap {
            map.set(entry.from, entry.to)
                .context(format!("Invalid remap 0x{:X} -> 0x{:X}", entry.from, entry.to))?;
        }

        debug!("Scancode map has {} overrides", map.overrides().count());
        Ok(map)
    }

    /// Translation settings for a new filter
    pub fn filter_settings(&self) -> Result<FilterSettings> {
        let translator = ScanCodeTranslator::new(Arc::new(self.scancode_map()?))
            .with_rctrl_is_lalt(self.keyboard.rctrl_is_lalt);

        let pointer = PointerStateTracker::new()
            .with_divisor(self.mouse.absolute_divisor)
            .with_recenter_policy(self.mouse.recenter);

        Ok(FilterSettings {
            translator,
            pointer,
            layout: HeaderLayout::native(),
        })
    }
}
