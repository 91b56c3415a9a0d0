//! Trace Replay
//!
//! Drives a real [`RawEventInterceptor`] from a JSON-lines trace of host
//! events, with in-memory stand-ins for the raw-input subsystem, the host
//! window and the emulated devices. Used by the `rawinput-replay` binary and by
//! integration tests.
//!
//! One event per line; blank lines and lines starting with `#` are skipped:
//!
//! ```text
//! {"event":"capture","enabled":true}
//! {"event":"raw_input","report":{"type":"keyboard","make_code":30}}
//! {"event":"raw_input","report":{"type":"mouse","x":5,"y":-3,"button_flags":1}}
//! {"event":"menu_show","menu":1}
//! {"event":"sys_key_down","virtual_key":115}
//! ```

use std::collections::{BTreeSet, HashMap};
use std::io::BufRead;

use anyhow::{Context, Result};
use bytes::Bytes;
use enumflags2::BitFlags;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::input::{
    DeviceSubscription, Disposition, EmulatedDeviceSink, FilterSettings, HeaderLayout, HidReport,
    HostMessage, HostWindow, InputError, InputSource, InterceptorStats, KeyboardReport, MenuId,
    MouseReport, RawEventInterceptor, RawInputHandle, RawReport, WindowRect,
};
use crate::input::mouse::ButtonMask;

/// Report carried by a `raw_input` trace event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceReport {
    /// Keyboard report
    Keyboard {
        /// Make code
        make_code: u16,
        /// Prefix/break flags (`BREAK=1, E0=2, E1=4`)
        #[serde(default)]
        flags: u16,
    },
    /// Mouse report
    Mouse {
        /// Horizontal value
        #[serde(default)]
        x: i32,
        /// Vertical value
        #[serde(default)]
        y: i32,
        /// Coordinates are absolute
        #[serde(default)]
        absolute: bool,
        /// Raw button transition flags
        #[serde(default)]
        button_flags: u16,
        /// Wheel delta (with the wheel flag)
        #[serde(default)]
        button_data: i16,
    },
    /// Generic HID report
    Hid {
        /// Device handle
        #[serde(default)]
        device: u64,
        /// Bytes per report
        size_hid: u32,
        /// Number of reports
        count: u32,
        /// Report bytes
        data: Vec<u8>,
    },
}

impl From<&TraceReport> for RawReport {
    fn from(report: &TraceReport) -> Self {
        match report {
            TraceReport::Keyboard { make_code, flags } => RawReport::Keyboard(KeyboardReport {
                make_code: *make_code,
                flags: BitFlags::from_bits_truncate(*flags),
                vkey: 0,
            }),
            TraceReport::Mouse {
                x,
                y,
                absolute,
                button_flags,
                button_data,
            } => RawReport::Mouse(MouseReport {
                x: *x,
                y: *y,
                transitions: BitFlags::from_bits_truncate(*button_flags),
                button_data: *button_data,
                absolute: *absolute,
            }),
            TraceReport::Hid {
                device,
                size_hid,
                count,
                data,
            } => RawReport::Hid(HidReport {
                device: *device,
                size_hid: *size_hid,
                count: *count,
                data: Bytes::copy_from_slice(data),
            }),
        }
    }
}

/// One host event in a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Raw input notification for a report
    RawInput {
        /// The report
        report: TraceReport,
        /// Bytes withheld on fetch, to provoke a size mismatch
        #[serde(default)]
        short_by: u32,
    },
    /// System key down
    SysKeyDown {
        /// Virtual key code
        virtual_key: u32,
    },
    /// Any other native message
    Other {
        /// Native message id
        id: u32,
    },
    /// Change window activation
    Activate {
        /// Primary window active
        primary: bool,
        /// Secondary render surfaces' activation
        #[serde(default)]
        surfaces: Vec<bool>,
    },
    /// Menu about to show
    MenuShow {
        /// Menu id
        menu: u32,
    },
    /// Menu about to hide
    MenuHide {
        /// Menu id
        menu: u32,
    },
    /// Toggle mouse capture
    Capture {
        /// Capture enabled
        enabled: bool,
    },
}

/// Parse a JSON-lines trace
pub fn parse_trace(reader: impl BufRead) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read trace")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: TraceEvent = serde_json::from_str(line)
            .context(format!("Invalid trace event on line {}", index + 1))?;
        events.push(event);
    }

    Ok(events)
}

/// In-memory raw-input subsystem
#[derive(Debug, Default)]
pub struct ReplaySource {
    pending: HashMap<RawInputHandle, (Bytes, u32)>,
    next_handle: isize,
    registrations: Vec<Vec<DeviceSubscription>>,
    reject_registration: bool,
}

impl ReplaySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every registration request
    pub fn rejecting() -> Self {
        Self {
            reject_registration: true,
            ..Self::default()
        }
    }

    /// Queue encoded report bytes, delivering `short_by` fewer than advertised
    pub fn queue(&mut self, bytes: Bytes, short_by: u32) -> RawInputHandle {
        self.next_handle += 1;
        let handle = RawInputHandle(self.next_handle);
        self.pending.insert(handle, (bytes, short_by));
        handle
    }

    /// Release a report the filter never fetched
    pub fn discard(&mut self, handle: RawInputHandle) {
        self.pending.remove(&handle);
    }

    /// Reports queued and not yet fetched or discarded
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Every `register_devices` call so far
    pub fn registrations(&self) -> &[Vec<DeviceSubscription>] {
        &self.registrations
    }
}

impl InputSource for ReplaySource {
    fn register_devices(&mut self, devices: &[DeviceSubscription]) -> crate::input::Result<()> {
        self.registrations.push(devices.to_vec());
        if self.reject_registration {
            return Err(InputError::RegistrationRejected(
                "replay source rejects registration".to_string(),
            ));
        }
        Ok(())
    }

    fn report_size(&mut self, handle: RawInputHandle) -> Option<u32> {
        self.pending
            .get(&handle)
            .map(|(bytes, _)| bytes.len() as u32)
    }

    fn fetch_report(&mut self, handle: RawInputHandle, buf: &mut [u8]) -> Option<u32> {
        let (bytes, short_by) = self.pending.remove(&handle)?;
        let delivered = bytes.len().saturating_sub(short_by as usize).min(buf.len());
        buf[..delivered].copy_from_slice(&bytes[..delivered]);
        Some(delivered as u32)
    }
}

/// In-memory host window
#[derive(Debug, Clone)]
pub struct ReplayWindow {
    /// Primary window active
    pub active: bool,
    /// Secondary surface activation
    pub surfaces: Vec<bool>,
    /// Menus reachable at construction
    pub menus: Vec<MenuId>,
    /// Window rectangle
    pub rect: WindowRect,
    /// Last cursor position set
    pub cursor: Option<(i32, i32)>,
    /// Fullscreen hotkey checks performed
    pub fullscreen_checks: u64,
}

impl ReplayWindow {
    /// Active 640x480 window at the origin
    pub fn new(menus: Vec<MenuId>) -> Self {
        Self {
            active: true,
            surfaces: Vec::new(),
            menus,
            rect: WindowRect {
                left: 0,
                top: 0,
                right: 640,
                bottom: 480,
            },
            cursor: None,
            fullscreen_checks: 0,
        }
    }
}

impl HostWindow for ReplayWindow {
    fn is_active(&self) -> bool {
        self.active
    }

    fn surface_activity(&self) -> Vec<bool> {
        self.surfaces.clone()
    }

    fn menus(&self) -> Vec<MenuId> {
        self.menus.clone()
    }

    fn geometry(&self) -> WindowRect {
        self.rect
    }

    fn set_cursor_position(&mut self, x: i32, y: i32) {
        debug!("Cursor -> ({}, {})", x, y);
        self.cursor = Some((x, y));
    }

    fn check_fullscreen_hotkey(&mut self) {
        self.fullscreen_checks += 1;
    }
}

/// A call made on the emulated devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SinkCall {
    /// Key transition
    Key {
        /// Make or break
        pressed: bool,
        /// Scan code
        code: u16,
    },
    /// Button mask replaced
    Buttons {
        /// Mask bits
        mask: u8,
    },
    /// Wheel notches
    Wheel {
        /// Notches
        notches: i32,
    },
    /// Relative motion
    Motion {
        /// Horizontal delta
        dx: i32,
        /// Vertical delta
        dy: i32,
    },
    /// HID report for the joystick layer
    Hid {
        /// Device handle
        device: u64,
        /// Payload length
        len: usize,
    },
}

/// Emulated devices that record and log every call
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Mouse capture flag
    pub capture: bool,
    /// Calls in order
    pub calls: Vec<SinkCall>,
}

impl RecordingSink {
    /// Sink with capture on or off
    pub fn new(capture: bool) -> Self {
        Self {
            capture,
            calls: Vec::new(),
        }
    }

    fn record(&mut self, call: SinkCall) {
        info!("Device call: {:?}", call);
        self.calls.push(call);
    }
}

impl EmulatedDeviceSink for RecordingSink {
    fn submit_key_event(&mut self, pressed: bool, code: u16) {
        self.record(SinkCall::Key { pressed, code });
    }

    fn set_button_mask(&mut self, mask: ButtonMask) {
        self.record(SinkCall::Buttons { mask: mask.bits() });
    }

    fn set_wheel_notches(&mut self, notches: i32) {
        self.record(SinkCall::Wheel { notches });
    }

    fn scale_motion(&mut self, dx: i32, dy: i32) {
        self.record(SinkCall::Motion { dx, dy });
    }

    fn dispatch_hid_report(&mut self, report: &HidReport) {
        self.record(SinkCall::Hid {
            device: report.device,
            len: report.data.len(),
        });
    }

    fn capture_enabled(&self) -> bool {
        self.capture
    }
}

/// Result of replaying a trace
#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    /// Interceptor counters
    pub stats: InterceptorStats,
    /// Device calls in order
    pub calls: Vec<SinkCall>,
    /// Messages consumed by the filter
    pub consumed: u64,
    /// Messages passed to the host
    pub passed: u64,
    /// Final host cursor position
    pub cursor: Option<(i32, i32)>,
}

/// Menus referenced anywhere in the trace; stands in for the window's menu bar
fn trace_menus(events: &[TraceEvent]) -> Vec<MenuId> {
    let ids: BTreeSet<u32> = events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::MenuShow { menu } | TraceEvent::MenuHide { menu } => Some(*menu),
            _ => None,
        })
        .collect();
    ids.into_iter().map(MenuId).collect()
}

type ReplayFilter = RawEventInterceptor<ReplaySource, ReplayWindow, RecordingSink>;

/// Hand one message to the filter, then drop any report it left unfetched
fn deliver(filter: &mut ReplayFilter, message: &HostMessage) -> Disposition {
    let disposition = filter.handle(message);
    if let HostMessage::RawInput { handle } = message {
        filter.source_mut().discard(*handle);
    }
    disposition
}

/// Replay `events` through a fresh filter
pub fn replay(events: &[TraceEvent], settings: FilterSettings) -> Result<ReplayOutcome> {
    let layout: HeaderLayout = settings.layout;
    let window = ReplayWindow::new(trace_menus(events));

    let mut filter = RawEventInterceptor::register(
        ReplaySource::new(),
        window,
        RecordingSink::new(false),
        settings,
    )
    .context("Failed to register raw input filter")?;

    let mut consumed = 0;
    let mut passed = 0;

    for event in events {
        let message = match event {
            TraceEvent::RawInput { report, short_by } => {
                let bytes = RawReport::from(report).encode(layout);
                let handle = filter.source_mut().queue(bytes, *short_by);
                Some(HostMessage::RawInput { handle })
            }
            TraceEvent::SysKeyDown { virtual_key } => Some(HostMessage::SysKeyDown {
                virtual_key: *virtual_key,
            }),
            TraceEvent::Other { id } => Some(HostMessage::Other { id: *id }),
            TraceEvent::Activate { primary, surfaces } => {
                let window = filter.window_mut();
                window.active = *primary;
                window.surfaces = surfaces.clone();
                None
            }
            TraceEvent::MenuShow { menu } => {
                filter.menu_about_to_show(MenuId(*menu));
                None
            }
            TraceEvent::MenuHide { menu } => {
                filter.menu_about_to_hide(MenuId(*menu));
                None
            }
            TraceEvent::Capture { enabled } => {
                filter.sink_mut().capture = *enabled;
                None
            }
        };

        if let Some(message) = message {
            match deliver(&mut filter, &message) {
                Disposition::Consumed => consumed += 1,
                Disposition::NotHandled => passed += 1,
            }
        }
    }

    let outcome = ReplayOutcome {
        stats: *filter.stats(),
        calls: filter.sink().calls.clone(),
        consumed,
        passed,
        cursor: filter.window().cursor,
    };
    debug!("Replayed {} events", events.len());

    Ok(outcome)
}
