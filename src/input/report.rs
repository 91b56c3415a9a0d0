//! Raw Input Report Codec
//!
//! Decodes the buffer returned by the host's raw-input fetch into a tagged
//! [`RawReport`]. The layout follows the host `RAWINPUT` structure: a header
//! whose handle-sized fields depend on the pointer width, then a keyboard,
//! mouse or HID payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use enumflags2::{bitflags, BitFlags};

use crate::input::error::{InputError, Result};

/// Header `type` value for mouse reports
pub const TYPE_MOUSE: u32 = 0;
/// Header `type` value for keyboard reports
pub const TYPE_KEYBOARD: u32 = 1;
/// Header `type` value for other HID reports
pub const TYPE_HID: u32 = 2;

const KEYBOARD_PAYLOAD_LEN: usize = 16;
const MOUSE_PAYLOAD_LEN: usize = 24;
const HID_PREFIX_LEN: usize = 8;

/// `usFlags` bit marking absolute coordinates
const MOUSE_MOVE_ABSOLUTE: u16 = 0x0001;

/// Keyboard prefix flags (`RI_KEY_*`)
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFlag {
    /// Key released
    Break = 0x0001,
    /// E0 prefix
    E0 = 0x0002,
    /// E1 prefix
    E1 = 0x0004,
}

/// Mouse button transition flags (`RI_MOUSE_*`)
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTransition {
    /// Left button pressed
    LeftDown = 0x0001,
    /// Left button released
    LeftUp = 0x0002,
    /// Right button pressed
    RightDown = 0x0004,
    /// Right button released
    RightUp = 0x0008,
    /// Middle button pressed
    MiddleDown = 0x0010,
    /// Middle button released
    MiddleUp = 0x0020,
    /// Fourth button pressed
    Button4Down = 0x0040,
    /// Fourth button released
    Button4Up = 0x0080,
    /// Fifth button pressed
    Button5Down = 0x0100,
    /// Fifth button released
    Button5Up = 0x0200,
    /// Vertical wheel moved, delta in `button_data`
    Wheel = 0x0400,
    /// Horizontal wheel moved, delta in `button_data`
    HWheel = 0x0800,
}

/// Width of the handle-sized header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// 32-bit host: 16-byte header
    Bits32,
    /// 64-bit host: 24-byte header
    Bits64,
}

impl HeaderLayout {
    /// Layout of the running process
    pub fn native() -> Self {
        if cfg!(target_pointer_width = "64") {
            HeaderLayout::Bits64
        } else {
            HeaderLayout::Bits32
        }
    }

    /// Header length in bytes
    pub fn header_len(self) -> usize {
        match self {
            HeaderLayout::Bits32 => 16,
            HeaderLayout::Bits64 => 24,
        }
    }

    fn get_handle(self, buf: &mut impl Buf) -> u64 {
        match self {
            HeaderLayout::Bits32 => buf.get_u32_le() as u64,
            HeaderLayout::Bits64 => buf.get_u64_le(),
        }
    }

    fn put_handle(self, buf: &mut impl BufMut, value: u64) {
        match self {
            HeaderLayout::Bits32 => buf.put_u32_le(value as u32),
            HeaderLayout::Bits64 => buf.put_u64_le(value),
        }
    }
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self::native()
    }
}

/// Keyboard payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardReport {
    /// Raw make code
    pub make_code: u16,
    /// Prefix and break flags
    pub flags: BitFlags<KeyFlag>,
    /// Host virtual key, informational only
    pub vkey: u16,
}

impl KeyboardReport {
    /// Key-down report without prefixes
    pub fn make(make_code: u16) -> Self {
        Self {
            make_code,
            flags: BitFlags::empty(),
            vkey: 0,
        }
    }

    /// Add flags to the report
    pub fn with_flags(mut self, flags: impl Into<BitFlags<KeyFlag>>) -> Self {
        self.flags |= flags.into();
        self
    }

    /// Key released
    pub fn is_break(&self) -> bool {
        self.flags.contains(KeyFlag::Break)
    }
}

/// Mouse payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseReport {
    /// X coordinate or delta
    pub x: i32,
    /// Y coordinate or delta
    pub y: i32,
    /// Button transitions and wheel flags
    pub transitions: BitFlags<ButtonTransition>,
    /// Signed wheel data, meaningful only with a wheel flag
    pub button_data: i16,
    /// Coordinates are absolute
    pub absolute: bool,
}

impl MouseReport {
    /// Relative motion report
    pub fn relative(dx: i32, dy: i32) -> Self {
        Self {
            x: dx,
            y: dy,
            ..Self::default()
        }
    }

    /// Absolute position report
    pub fn absolute(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            absolute: true,
            ..Self::default()
        }
    }

    /// Add button transitions
    pub fn with_transitions(mut self, transitions: impl Into<BitFlags<ButtonTransition>>) -> Self {
        self.transitions |= transitions.into();
        self
    }

    /// Add a vertical wheel movement in raw units
    pub fn with_wheel(mut self, delta: i16) -> Self {
        self.transitions |= ButtonTransition::Wheel;
        self.button_data = delta;
        self
    }

    /// Vertical wheel delta in raw units, if the wheel moved
    pub fn wheel(&self) -> Option<i16> {
        self.transitions
            .contains(ButtonTransition::Wheel)
            .then_some(self.button_data)
    }
}

/// Generic HID payload, forwarded untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidReport {
    /// Originating device handle
    pub device: u64,
    /// Size of a single HID input report
    pub size_hid: u32,
    /// Number of reports in `data`
    pub count: u32,
    /// Concatenated report bytes
    pub data: Bytes,
}

/// Decoded raw-input report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReport {
    /// Keyboard transition
    Keyboard(KeyboardReport),
    /// Mouse buttons, wheel and motion
    Mouse(MouseReport),
    /// Anything else (joysticks, gamepads)
    Hid(HidReport),
}

fn ensure(buf: &impl Buf, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(InputError::MalformedReport(format!(
            "{} needs {} bytes, {} available",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

impl RawReport {
    /// Decode a fetched raw-input buffer
    pub fn decode(bytes: &[u8], layout: HeaderLayout) -> Result<Self> {
        let mut buf = bytes;

        ensure(&buf, layout.header_len(), "header")?;
        let kind = buf.get_u32_le();
        let size = buf.get_u32_le() as usize;
        let device = layout.get_handle(&mut buf);
        let _wparam = layout.get_handle(&mut buf);

        if size > bytes.len() {
            return Err(InputError::MalformedReport(format!(
                "header claims {} bytes, buffer holds {}",
                size,
                bytes.len()
            )));
        }

        match kind {
            TYPE_KEYBOARD => {
                ensure(&buf, KEYBOARD_PAYLOAD_LEN, "keyboard payload")?;
                let make_code = buf.get_u16_le();
                let flags = BitFlags::from_bits_truncate(buf.get_u16_le());
                let _reserved = buf.get_u16_le();
                let vkey = buf.get_u16_le();
                Ok(RawReport::Keyboard(KeyboardReport {
                    make_code,
                    flags,
                    vkey,
                }))
            }
            TYPE_MOUSE => {
                ensure(&buf, MOUSE_PAYLOAD_LEN, "mouse payload")?;
                let move_flags = buf.get_u16_le();
                let _pad = buf.get_u16_le();
                let transitions = BitFlags::from_bits_truncate(buf.get_u16_le());
                let button_data = buf.get_i16_le();
                let _raw_buttons = buf.get_u32_le();
                let x = buf.get_i32_le();
                let y = buf.get_i32_le();
                Ok(RawReport::Mouse(MouseReport {
                    x,
                    y,
                    transitions,
                    button_data,
                    absolute: move_flags & MOUSE_MOVE_ABSOLUTE != 0,
                }))
            }
            TYPE_HID => {
                ensure(&buf, HID_PREFIX_LEN, "HID prefix")?;
                let size_hid = buf.get_u32_le();
                let count = buf.get_u32_le();
                let len = (size_hid as usize)
                    .checked_mul(count as usize)
                    .ok_or_else(|| InputError::MalformedReport("HID length overflow".into()))?;
                ensure(&buf, len, "HID data")?;
                Ok(RawReport::Hid(HidReport {
                    device,
                    size_hid,
                    count,
                    data: Bytes::copy_from_slice(&buf[..len]),
                }))
            }
            other => Err(InputError::UnknownReportType(other)),
        }
    }

    /// Encode into the host buffer layout
    pub fn encode(&self, layout: HeaderLayout) -> Bytes {
        let (kind, device, payload_len) = match self {
            RawReport::Keyboard(_) => (TYPE_KEYBOARD, 0, KEYBOARD_PAYLOAD_LEN),
            RawReport::Mouse(_) => (TYPE_MOUSE, 0, MOUSE_PAYLOAD_LEN),
            RawReport::Hid(hid) => (TYPE_HID, hid.device, HID_PREFIX_LEN + hid.data.len()),
        };
        let total = layout.header_len() + payload_len;

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u32_le(kind);
        buf.put_u32_le(total as u32);
        layout.put_handle(&mut buf, device);
        layout.put_handle(&mut buf, 0);

        match self {
            RawReport::Keyboard(kbd) => {
                buf.put_u16_le(kbd.make_code);
                buf.put_u16_le(kbd.flags.bits());
                buf.put_u16_le(0);
                buf.put_u16_le(kbd.vkey);
                buf.put_u32_le(0);
                buf.put_u32_le(0);
            }
            RawReport::Mouse(mouse) => {
                buf.put_u16_le(if mouse.absolute {
                    MOUSE_MOVE_ABSOLUTE
                } else {
                    0
                });
                buf.put_u16_le(0);
                buf.put_u16_le(mouse.transitions.bits());
                buf.put_i16_le(mouse.button_data);
                buf.put_u32_le(0);
                buf.put_i32_le(mouse.x);
                buf.put_i32_le(mouse.y);
                buf.put_u32_le(0);
            }
            RawReport::Hid(hid) => {
                buf.put_u32_le(hid.size_hid);
                buf.put_u32_le(hid.count);
                buf.put_slice(&hid.data);
            }
        }

        buf.freeze()
    }
}
