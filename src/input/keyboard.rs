//! Keyboard Scan Code Translation
//!
//! Turns a raw keyboard report into a normalized `(pressed, code)` pair for the
//! emulated keyboard. Resolution order:
//!
//! 1. E1 prefix: only `E1 1D` (Pause) survives, as the composite code `0x100`
//!    looked up once in the remap table. Everything else is the sentinel.
//! 2. Otherwise fold E0 into bit 8, normalize, remap, then apply the optional
//!    right-Ctrl to left-Alt swap.
//!
//! Sentinel codes never produce an event.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::input::mapper::{codes, normalize, ScanCodeMap, SENTINEL};
use crate::input::report::{KeyFlag, KeyboardReport};

/// Make code that is valid after an E1 prefix
const E1_PAUSE_MAKE: u16 = 0x1D;

/// Normalized key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Make (true) or break (false)
    pub pressed: bool,
    /// Canonical 9-bit scan code
    pub code: u16,
}

/// Outcome of translating one keyboard report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTranslation {
    /// Event for the emulated keyboard, `None` when dropped
    pub event: Option<KeyEvent>,
    /// The host window should check its fullscreen hotkey
    pub poll_fullscreen_hotkey: bool,
}

/// Keyboard report translator
#[derive(Debug, Clone)]
pub struct ScanCodeTranslator {
    /// Shared remap table
    map: Arc<ScanCodeMap>,

    /// Treat right Ctrl as left Alt
    rctrl_is_lalt: bool,
}

impl ScanCodeTranslator {
    /// Create a translator over a shared remap table
    pub fn new(map: Arc<ScanCodeMap>) -> Self {
        Self {
            map,
            rctrl_is_lalt: false,
        }
    }

    /// Enable or disable the right-Ctrl to left-Alt swap
    pub fn with_rctrl_is_lalt(mut self, enabled: bool) -> Self {
        self.rctrl_is_lalt = enabled;
        self
    }

    /// Whether the right-Ctrl swap is active
    pub fn rctrl_is_lalt(&self) -> bool {
        self.rctrl_is_lalt
    }

    /// Remap table in use
    pub fn map(&self) -> &ScanCodeMap {
        &self.map
    }

    /// Resolve a make code and its prefix flags to a canonical code or [`SENTINEL`]
    pub fn resolve(&self, make_code: u16, flags: enumflags2::BitFlags<KeyFlag>) -> u16 {
        if flags.contains(KeyFlag::E1) {
            return if make_code == E1_PAUSE_MAKE {
                self.map.get(codes::PAUSE).unwrap_or(codes::PAUSE)
            } else {
                SENTINEL
            };
        }

        let mut code = make_code;
        if flags.contains(KeyFlag::E0) {
            code |= 0x100;
        }

        let code = self.map.remap(normalize(code));

        if code == codes::RIGHT_CTRL && self.rctrl_is_lalt {
            codes::LEFT_ALT
        } else {
            code
        }
    }

    /// Translate one keyboard report
    pub fn translate(&self, report: &KeyboardReport) -> KeyTranslation {
        let code = self.resolve(report.make_code, report.flags);
        let poll_fullscreen_hotkey = !report.flags.contains(KeyFlag::E1);

        if code == SENTINEL {
            trace!(
                "Dropping untranslatable key: make=0x{:03X} flags={:?}",
                report.make_code,
                report.flags
            );
            return KeyTranslation {
                event: None,
                poll_fullscreen_hotkey,
            };
        }

        let event = KeyEvent {
            pressed: !report.is_break(),
            code,
        };
        debug!(
            "Key {}: make=0x{:03X} -> 0x{:03X}",
            if event.pressed { "down" } else { "up" },
            report.make_code,
            code
        );

        KeyTranslation {
            event: Some(event),
            poll_fullscreen_hotkey,
        }
    }
}

impl Default for ScanCodeTranslator {
    fn default() -> Self {
        Self::new(Arc::new(ScanCodeMap::identity()))
    }
}
