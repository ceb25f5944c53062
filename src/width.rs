//! Data-object widths and the `b`/`w`/`l`/`q` command suffixes that select them.
//!
//! Objects are moved between the mapped page and the line buffer as plain native-endian bytes;
//! [`DataWidth::decode`] and [`DataWidth::encode`] are the only places that give those bytes an
//! integer meaning.

use std::fmt;

use crate::error::{MemtoolError, Result};

/// Width of one data object in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataWidth {
    Byte,
    Word,
    Long,
    Quad,
}

impl DataWidth {
    pub const ALL: [DataWidth; 4] = [
        DataWidth::Byte,
        DataWidth::Word,
        DataWidth::Long,
        DataWidth::Quad,
    ];

    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
            DataWidth::Long => 4,
            DataWidth::Quad => 8,
        }
    }

    /// Number of hex digits needed to print one object.
    #[inline]
    pub const fn hex_digits(self) -> usize {
        self.bytes() * 2
    }

    /// Mask keeping the low `8 * bytes()` bits of a value.
    #[inline]
    pub const fn mask(self) -> u64 {
        match self {
            DataWidth::Quad => u64::MAX,
            _ => (1u64 << (self.bytes() * 8)) - 1,
        }
    }

    /// Narrows `value` to this width, keeping the low-order bits.
    #[inline]
    pub const fn truncate(self, value: u64) -> u64 {
        value & self.mask()
    }

    /// Interprets the first `bytes()` bytes of `raw` as a native-endian integer.
    ///
    /// Panics if `raw` is shorter than the width.
    pub fn decode(self, raw: &[u8]) -> u64 {
        match self {
            DataWidth::Byte => u64::from(raw[0]),
            DataWidth::Word => u64::from(u16::from_ne_bytes([raw[0], raw[1]])),
            DataWidth::Long => u64::from(u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
            DataWidth::Quad => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&raw[..8]);
                u64::from_ne_bytes(buf)
            }
        }
    }

    /// Native-endian bytes of `value` narrowed to this width. Only the first `bytes()` entries of
    /// the returned array are meaningful.
    pub fn encode(self, value: u64) -> [u8; 8] {
        let mut out = [0u8; 8];
        match self {
            DataWidth::Byte => out[0] = value as u8,
            DataWidth::Word => out[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
            DataWidth::Long => out[..4].copy_from_slice(&(value as u32).to_ne_bytes()),
            DataWidth::Quad => out.copy_from_slice(&value.to_ne_bytes()),
        }
        out
    }

    /// Resolves an optional width suffix for the given platform.
    ///
    /// `None` selects the platform default: 8 bytes on 64-bit targets, 4 otherwise.
    pub fn resolve(suffix: Option<char>, arch: Arch) -> Result<DataWidth> {
        match suffix {
            None => Ok(arch.default_width()),
            Some('b') => Ok(DataWidth::Byte),
            Some('w') => Ok(DataWidth::Word),
            Some('l') => Ok(DataWidth::Long),
            Some('q') if arch.supports_quad() => Ok(DataWidth::Quad),
            Some('q') => Err(MemtoolError::UnsupportedWidthOnPlatform { suffix: 'q' }),
            Some(other) => Err(MemtoolError::InvalidWidthSuffix {
                suffix: other.to_string(),
            }),
        }
    }

    /// Resolves the width encoded in an applet name such as `md`, `md.l` or `mw.q`.
    ///
    /// The first two characters name the operation and are not inspected here. Anything after them
    /// must be empty or a `.` followed by exactly one suffix character.
    pub fn from_applet(applet: &str, arch: Arch) -> Result<DataWidth> {
        let tail = applet.get(2..).unwrap_or("");
        if tail.is_empty() {
            return DataWidth::resolve(None, arch);
        }

        let invalid = || MemtoolError::InvalidWidthSuffix {
            suffix: tail.to_string(),
        };
        let suffix = tail.strip_prefix('.').ok_or_else(invalid)?;
        let mut chars = suffix.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => DataWidth::resolve(Some(c), arch),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for DataWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// Pointer width of the platform the tool runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Bits32,
    Bits64,
}

impl Arch {
    pub const fn host() -> Arch {
        if cfg!(target_pointer_width = "64") {
            Arch::Bits64
        } else {
            Arch::Bits32
        }
    }

    pub const fn supports_quad(self) -> bool {
        matches!(self, Arch::Bits64)
    }

    pub const fn default_width(self) -> DataWidth {
        match self {
            Arch::Bits64 => DataWidth::Quad,
            Arch::Bits32 => DataWidth::Long,
        }
    }
}
