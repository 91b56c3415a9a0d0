//! Host and Device Seams
//!
//! The filter talks to three collaborators it does not implement:
//!
//! - [`InputSource`]: the host raw-input subsystem (subscription and the
//!   two-call size-then-fetch retrieval)
//! - [`HostWindow`]: activation, geometry and cursor of the top-level window
//! - [`EmulatedDeviceSink`]: the emulated keyboard/mouse/joystick devices
//!
//! Keeping these behind traits lets the translation logic run against
//! synthetic reports in tests and in the replay tool.

use enumflags2::{bitflags, BitFlags};
use serde::{Deserialize, Serialize};

use crate::input::error::Result;
use crate::input::mouse::ButtonMask;
use crate::input::report::HidReport;

/// HID usage page for generic desktop controls
pub const USAGE_PAGE_GENERIC: u16 = 0x01;
/// HID usage for mice
pub const USAGE_MOUSE: u16 = 0x02;
/// HID usage for keyboards
pub const USAGE_KEYBOARD: u16 = 0x06;

/// Virtual key of F4, the close-window hotkey when sent with Alt
pub const VK_F4: u32 = 0x73;

/// Opaque handle carried by a raw-input-available notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawInputHandle(pub isize);

/// Identity of a menu reachable from the host window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MenuId(pub u32);

/// Raw-input subscription flags (`RIDEV_*`)
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFlag {
    /// Remove the subscription
    Remove = 0x0000_0001,
    /// Suppress host system hotkeys
    NoHotkeys = 0x0000_0200,
}

/// One raw-input device class subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSubscription {
    /// HID usage page
    pub usage_page: u16,
    /// HID usage
    pub usage: u16,
    /// Subscription flags
    pub flags: BitFlags<SubscriptionFlag>,
}

impl DeviceSubscription {
    /// Generic keyboard with host hotkeys suppressed
    pub fn keyboard() -> Self {
        Self {
            usage_page: USAGE_PAGE_GENERIC,
            usage: USAGE_KEYBOARD,
            flags: SubscriptionFlag::NoHotkeys.into(),
        }
    }

    /// Generic mouse, no flags
    pub fn mouse() -> Self {
        Self {
            usage_page: USAGE_PAGE_GENERIC,
            usage: USAGE_MOUSE,
            flags: BitFlags::empty(),
        }
    }

    /// Same device class with only the remove flag
    pub fn removal(self) -> Self {
        Self {
            flags: SubscriptionFlag::Remove.into(),
            ..self
        }
    }
}

/// The keyboard and mouse subscriptions every filter holds
pub fn default_subscriptions() -> [DeviceSubscription; 2] {
    [DeviceSubscription::keyboard(), DeviceSubscription::mouse()]
}

/// Screen rectangle of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowRect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Right edge
    pub right: i32,
    /// Bottom edge
    pub bottom: i32,
}

impl WindowRect {
    /// Integer midpoint, biased toward the top-left
    pub fn center(&self) -> (i32, i32) {
        (midpoint(self.left, self.right), midpoint(self.top, self.bottom))
    }
}

/// Lies between `low` and `high`, so it always fits back into `i32`
fn midpoint(low: i32, high: i32) -> i32 {
    let low = i64::from(low);
    (low + (i64::from(high) - low) / 2) as i32
}

/// Native message delivered to the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostMessage {
    /// Raw input is available for the handle
    RawInput {
        /// Report handle
        handle: RawInputHandle,
    },
    /// System key down (Alt chords)
    SysKeyDown {
        /// Virtual key code
        virtual_key: u32,
    },
    /// Any other message
    Other {
        /// Native message id
        id: u32,
    },
}

/// Host raw-input subsystem
#[cfg_attr(test, mockall::automock)]
pub trait InputSource {
    /// Subscribe (or, with the remove flag, unsubscribe) device classes
    fn register_devices(&mut self, devices: &[DeviceSubscription]) -> Result<()>;

    /// First call of the retrieval protocol: required buffer size
    fn report_size(&mut self, handle: RawInputHandle) -> Option<u32>;

    /// Second call: fill `buf`, returning the byte count written
    fn fetch_report(&mut self, handle: RawInputHandle, buf: &mut [u8]) -> Option<u32>;
}

/// Top-level window hosting the emulated display
#[cfg_attr(test, mockall::automock)]
pub trait HostWindow {
    /// Window currently has activation
    fn is_active(&self) -> bool;

    /// Activation of each secondary render surface, in order
    fn surface_activity(&self) -> Vec<bool>;

    /// Menus reachable from the window right now
    fn menus(&self) -> Vec<MenuId>;

    /// Screen rectangle of the window
    fn geometry(&self) -> WindowRect;

    /// Move the host cursor
    fn set_cursor_position(&mut self, x: i32, y: i32);

    /// Check whether the fullscreen hotkey combination just became satisfied
    fn check_fullscreen_hotkey(&mut self);
}

/// Emulated keyboard, mouse and joystick devices
#[cfg_attr(test, mockall::automock)]
pub trait EmulatedDeviceSink {
    /// Forward a key transition
    fn submit_key_event(&mut self, pressed: bool, code: u16);

    /// Replace the emulated button state
    fn set_button_mask(&mut self, mask: ButtonMask);

    /// Report wheel movement in notches
    fn set_wheel_notches(&mut self, notches: i32);

    /// Report relative motion
    fn scale_motion(&mut self, dx: i32, dy: i32);

    /// Hand a non-keyboard, non-mouse report to the joystick layer
    fn dispatch_hid_report(&mut self, report: &HidReport);

    /// Mouse capture is enabled
    fn capture_enabled(&self) -> bool;
}
