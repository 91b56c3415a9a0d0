//! Raw Input Filtering
//!
//! This module intercepts the host's raw keyboard, mouse and HID reports for a
//! top-level window and turns them into events for emulated PC devices.
//!
//! # Architecture
//!
//! ```text
//! Host native messages
//!       ↓
//! ┌─────────────────────────┐
//! │  RawEventInterceptor    │ ← Subscription owner, dispatcher
//! │  - Alt+F4 suppression   │
//! │  - Statistics tracking  │
//! └─────────────────────────┘
//!       ↓
//! ┌─────────────────────────┐
//! │  FocusGate              │ ← Primary window / render surfaces / menus
//! └─────────────────────────┘
//!       ↓           ↓           ↓
//! ┌──────────┐ ┌──────────┐ ┌───────────────┐
//! │ ScanCode │ │ Pointer  │ │  HID report   │
//! │Translator│ │ Tracker  │ │  passthrough  │
//! └──────────┘ └──────────┘ └───────────────┘
//!       ↓           ↓           ↓
//! EmulatedDeviceSink (keyboard, mouse, joystick)
//! ```
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use rawinput_bridge::input::{FilterSettings, HostMessage, RawEventInterceptor};
//!
//! let settings = FilterSettings::default();
//! let mut filter = RawEventInterceptor::register(source, window, sink, settings)?;
//! let disposition = filter.handle(&HostMessage::RawInput { handle });
//! ```
//!
//! Every raw-input notification is consumed, whether or not it reached a
//! device. The subscription is released when the interceptor is dropped.

pub mod error;
pub mod focus;
pub mod host;
pub mod interceptor;
pub mod keyboard;
pub mod mapper;
pub mod mouse;
pub mod report;

#[cfg(windows)]
pub mod win32;

pub use error::{classify_error, recovery_action, ErrorType, InputError, RecoveryAction, Result};
pub use focus::{route, FocusGate, Target};
pub use host::{
    default_subscriptions, DeviceSubscription, EmulatedDeviceSink, HostMessage, HostWindow,
    InputSource, MenuId, RawInputHandle, SubscriptionFlag, WindowRect, VK_F4,
};
pub use interceptor::{
    Disposition, DropCounts, DropReason, FilterSettings, InterceptorStats, RawEventInterceptor,
};
pub use keyboard::{KeyEvent, KeyTranslation, ScanCodeTranslator};
pub use mapper::{codes, normalize, ScanCodeMap, MAP_LEN, SENTINEL};
pub use mouse::{
    ButtonMask, MouseButton, PointerDelta, PointerState, PointerStateTracker, RecenterPolicy,
};
pub use report::{
    ButtonTransition, HeaderLayout, HidReport, KeyFlag, KeyboardReport, MouseReport, RawReport,
};

#[cfg(windows)]
pub use win32::{Win32InputSource, Win32Window};
