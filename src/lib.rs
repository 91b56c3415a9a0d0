//! # rawinput-bridge
//!
//! Host raw-input filter for an emulated PC. Intercepts keyboard, mouse and
//! HID reports delivered to the emulator's top-level window, normalizes them
//! and forwards them to the emulated devices.
//!
//! # Architecture
//!
//! ```text
//! rawinput-bridge
//!   ├─> input::RawEventInterceptor (subscription, routing, dispatch)
//!   │     ├─> input::FocusGate (window/surface/menu routing)
//!   │     ├─> input::ScanCodeTranslator (E0/E1 prefixes, remap table)
//!   │     └─> input::PointerStateTracker (buttons, wheel, absolute damping)
//!   ├─> config (TOML settings → FilterSettings)
//!   └─> replay (JSON-lines trace driver for the rawinput-replay binary)
//! ```
//!
//! # Data Flow
//!
//! **Keyboard:** Host → RawReport → ScanCodeTranslator → submit_key_event
//!
//! **Mouse:** Host → RawReport → PointerStateTracker → button mask / wheel / motion
//!
//! **HID:** Host → RawReport → dispatch_hid_report

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Filter configuration
pub mod config;

/// Raw input filtering
pub mod input;

/// Trace replay against in-memory host and devices
pub mod replay;
