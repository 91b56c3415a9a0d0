//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::input::RecenterPolicy;

/// Keyboard translation configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Deliver right Ctrl as left Alt
    pub rctrl_is_lalt: bool,

    /// Windows `Scancode Map` REG_BINARY dump to start from
    pub scancode_map_file: Option<PathBuf>,

    /// Inline overrides, applied after the map file
    pub remap: Vec<RemapEntry>,
}

/// One inline scan code override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapEntry {
    /// Source code (9-bit)
    pub from: u16,

    /// Target code (9-bit, or 0xFFFF to disable the key)
    pub to: u16,
}

/// Mouse handling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouseConfig {
    /// Damping divisor for absolute-mode deltas
    pub absolute_divisor: i32,

    /// When to recentre the host cursor ("absolute-only", "always")
    pub recenter: RecenterPolicy,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            absolute_divisor: crate::input::mouse::ABSOLUTE_DIVISOR,
            recenter: RecenterPolicy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty", "compact", "json")
    pub format: String,

    /// Directory for a daily-rolled log file
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
        }
    }
}
