//! Scan Code Remap Table
//!
//! Canonical 9-bit scan code space, the legacy range normalization applied to
//! raw make codes, and the [`ScanCodeMap`] override table. The table is built
//! once (identity, registry blob, inline overrides) and is read-only while a
//! filter translates.

use std::path::Path;

use bytes::Buf;
use tracing::{debug, trace};

use crate::input::error::{InputError, Result};

/// Reserved code meaning "no emulated target"; never forwarded
pub const SENTINEL: u16 = 0xFFFF;

/// Number of entries in a full table (0x000 - 0x1FF)
pub const MAP_LEN: usize = 0x200;

/// Canonical scan codes referenced by the translator
pub mod codes {
    pub const ESC: u16 = 0x001;
    pub const LEFT_CTRL: u16 = 0x01D;
    pub const LEFT_SHIFT: u16 = 0x02A;
    pub const LEFT_ALT: u16 = 0x038;
    pub const CAPS_LOCK: u16 = 0x03A;
    pub const F4: u16 = 0x03E;
    pub const NUM_LOCK: u16 = 0x045;
    /// E1 1D, the Pause/Break composite
    pub const PAUSE: u16 = 0x100;
    pub const KP_ENTER: u16 = 0x11C;
    pub const RIGHT_CTRL: u16 = 0x11D;
    pub const RIGHT_ALT: u16 = 0x138;
    pub const HOME: u16 = 0x147;
    pub const LEFT_META: u16 = 0x15B;
    pub const RIGHT_META: u16 = 0x15C;
}

/// Map a raw code onto the canonical 9-bit range.
///
/// Accepts both the `0x1xx` form (E0 bit already folded in) and the legacy
/// two-byte `0xE0xx` / `0xE11D` forms used by registry maps.
pub fn normalize(raw: u16) -> u16 {
    let code = if raw & 0xFF00 == 0xE000 {
        (raw & 0x00FF) | 0x0100
    } else {
        raw
    };

    if code == 0xE11D {
        codes::PAUSE
    } else if code > 0x01FF || code == 0x0100 {
        // E0 00 has no set-2 equivalent; some USB keyboards send it anyway.
        SENTINEL
    } else {
        code
    }
}

/// Scan code override table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCodeMap {
    entries: Vec<u16>,
}

impl ScanCodeMap {
    /// Identity table covering the whole 9-bit range
    pub fn identity() -> Self {
        Self {
            entries: (0..MAP_LEN as u16).collect(),
        }
    }

    /// Build from explicit entries; index is the source code
    pub fn from_entries(entries: Vec<u16>) -> Result<Self> {
        if entries.len() > MAP_LEN {
            return Err(InputError::InvalidScanCodeMap(format!(
                "{} entries exceeds the 9-bit range",
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    /// Parse a Windows `Scancode Map` REG_BINARY value on top of the identity table.
    ///
    /// Layout: `version u32, flags u32, count u32`, then `count` entries of
    /// `target u16, source u16`, the last being the zero terminator.
    pub fn from_registry_blob(blob: &[u8]) -> Result<Self> {
        let mut map = Self::identity();
        let mut buf = blob;

        if buf.remaining() < 12 {
            return Err(InputError::InvalidScanCodeMap(format!(
                "blob too short: {} bytes",
                blob.len()
            )));
        }
        let _version = buf.get_u32_le();
        let _flags = buf.get_u32_le();
        let count = buf.get_u32_le() as usize;

        if buf.remaining() < count.saturating_mul(4) {
            return Err(InputError::InvalidScanCodeMap(format!(
                "blob declares {} entries but holds {}",
                count,
                buf.remaining() / 4
            )));
        }

        for _ in 0..count.saturating_sub(1) {
            let target = buf.get_u16_le();
            let source = buf.get_u16_le();

            let from = normalize(source);
            if from == SENTINEL {
                trace!("Ignoring registry mapping from 0x{:04X}", source);
                continue;
            }
            // A zero target disables the key.
            let to = if target == 0 { SENTINEL } else { normalize(target) };
            map.entries[from as usize] = to;
        }

        debug!(
            "Loaded {} registry scan code overrides",
            map.overrides().count()
        );
        Ok(map)
    }

    /// Read a registry blob dumped to a file
    pub fn load_registry_file(path: impl AsRef<Path>) -> Result<Self> {
        let blob = std::fs::read(path.as_ref())?;
        Self::from_registry_blob(&blob)
    }

    /// Override a single entry
    pub fn set(&mut self, from: u16, to: u16) -> Result<()> {
        let index = from as usize;
        if index >= self.entries.len() {
            return Err(InputError::InvalidScanCodeMap(format!(
                "source 0x{:03X} outside table of {} entries",
                from,
                self.entries.len()
            )));
        }
        if to != SENTINEL && to as usize >= MAP_LEN {
            return Err(InputError::InvalidScanCodeMap(format!(
                "target 0x{:04X} is not a 9-bit code",
                to
            )));
        }
        self.entries[index] = to;
        Ok(())
    }

    /// Table entry for `code`, `None` when out of bounds
    pub fn get(&self, code: u16) -> Option<u16> {
        self.entries.get(code as usize).copied()
    }

    /// Substitute the table entry when it is in bounds and differs from `code`
    pub fn remap(&self, code: u16) -> u16 {
        match self.get(code) {
            Some(mapped) if mapped != code => mapped,
            _ => code,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-identity entries as `(from, to)`
    pub fn overrides(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(from, to)| *from != **to as usize)
            .map(|(from, to)| (from as u16, *to))
    }
}

impl Default for ScanCodeMap {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_blob(entries: &[(u16, u16)]) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&(entries.len() as u32 + 1).to_le_bytes());
        for (target, source) in entries {
            blob.extend_from_slice(&target.to_le_bytes());
            blob.extend_from_slice(&source.to_le_bytes());
        }
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob
    }

    #[test]
    fn test_normalize_ranges() {
        assert_eq!(normalize(0x1E), 0x1E);
        assert_eq!(normalize(0x11D), codes::RIGHT_CTRL);
        assert_eq!(normalize(0xE01D), codes::RIGHT_CTRL);
        assert_eq!(normalize(0xE11D), codes::PAUSE);
        assert_eq!(normalize(0x100), SENTINEL);
        assert_eq!(normalize(0xE000), SENTINEL);
        assert_eq!(normalize(0x200), SENTINEL);
        assert_eq!(normalize(0x3FF), SENTINEL);
    }

    #[test]
    fn test_identity_table() {
        let map = ScanCodeMap::identity();
        assert_eq!(map.len(), MAP_LEN);
        assert_eq!(map.get(0x1FF), Some(0x1FF));
        assert_eq!(map.get(0x200), None);
        assert_eq!(map.overrides().count(), 0);
    }

    #[test]
    fn test_remap_out_of_bounds_is_noop() {
        let map = ScanCodeMap::from_entries(vec![0x10, 0x20]).unwrap();
        assert_eq!(map.remap(0x0), 0x10);
        assert_eq!(map.remap(0x1), 0x20);
        assert_eq!(map.remap(0x2), 0x2);
        assert_eq!(map.remap(SENTINEL), SENTINEL);
    }

    #[test]
    fn test_set_rejects_bad_codes() {
        let mut map = ScanCodeMap::identity();
        assert!(map.set(0x200, 0x01).is_err());
        assert!(map.set(0x01, 0x300).is_err());
        assert!(map.set(0x3A, SENTINEL).is_ok());
        assert_eq!(map.remap(0x3A), SENTINEL);
    }

    #[test]
    fn test_from_entries_too_long() {
        assert!(ScanCodeMap::from_entries(vec![0; MAP_LEN + 1]).is_err());
    }

    #[test]
    fn test_registry_caps_to_ctrl() {
        // Caps Lock -> Left Ctrl, Right Alt (E0 38) -> Left Meta (E0 5B)
        let blob = registry_blob(&[(0x001D, 0x003A), (0xE05B, 0xE038)]);
        let map = ScanCodeMap::from_registry_blob(&blob).unwrap();

        assert_eq!(map.remap(codes::CAPS_LOCK), codes::LEFT_CTRL);
        assert_eq!(map.remap(codes::RIGHT_ALT), codes::LEFT_META);
        assert_eq!(map.overrides().count(), 2);
    }

    #[test]
    fn test_registry_zero_target_disables_key() {
        let blob = registry_blob(&[(0x0000, 0x005B)]);
        let map = ScanCodeMap::from_registry_blob(&blob).unwrap();
        assert_eq!(map.remap(0x5B), SENTINEL);
    }

    #[test]
    fn test_registry_invalid_source_ignored() {
        let blob = registry_blob(&[(0x001D, 0xE000)]);
        let map = ScanCodeMap::from_registry_blob(&blob).unwrap();
        assert_eq!(map, ScanCodeMap::identity());
    }

    #[test]
    fn test_registry_truncated() {
        assert!(ScanCodeMap::from_registry_blob(&[0; 8]).is_err());

        let mut blob = registry_blob(&[(0x001D, 0x003A)]);
        blob.truncate(blob.len() - 2);
        assert!(ScanCodeMap::from_registry_blob(&blob).is_err());
    }
}
