//! Device pack types

use std::fmt;
use std::str::FromStr;

/// Well-known address space names found in `.atdf` descriptors
pub mod memories {
    /// Program flash
    pub const PROG: &str = "prog";
    /// Data EEPROM
    pub const EEPROM: &str = "eeprom";
    /// Fuse bytes
    pub const FUSES: &str = "fuses";
    /// Lock bits
    pub const LOCKBITS: &str = "lockbits";
    /// User signature rows
    pub const USER_SIGNATURES: &str = "user_signatures";
}

/// One fuse register of a device
///
/// Fields are returned in descriptor order, which is also the order their
/// values are concatenated in a fuse write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuseField {
    /// Register name (e.g. "LOW")
    pub name: String,
    /// Human readable caption (e.g. "Low Fuse Byte")
    pub description: String,
}

impl FuseField {
    /// Create a new fuse field
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Everything known about one device, read from a single descriptor parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device name as spelled in the descriptor
    pub name: String,
    /// Address space names in document order
    pub memories: Vec<String>,
    /// Programming interfaces in document order
    pub interfaces: Vec<String>,
    /// Fuse registers in document order
    pub fuses: Vec<FuseField>,
}

impl DeviceInfo {
    /// Check whether the device has an address space with this name
    pub fn has_memory(&self, name: &str) -> bool {
        self.memories.iter().any(|m| m == name)
    }

    /// Check whether the device supports an interface (case-insensitive)
    pub fn supports_interface(&self, interface: &str) -> bool {
        self.interfaces
            .iter()
            .any(|i| i.eq_ignore_ascii_case(interface))
    }
}

/// A single fuse byte as entered in the hex editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuseValue(pub u8);

/// Error returned when a fuse value cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fuse value {0:?}: expected a hex byte 00..FF")]
pub struct ParseFuseValueError(pub String);

impl FromStr for FuseValue {
    type Err = ParseFuseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 2 {
            return Err(ParseFuseValueError(s.to_string()));
        }

        u8::from_str_radix(digits, 16)
            .map(FuseValue)
            .map_err(|_| ParseFuseValueError(s.to_string()))
    }
}

impl fmt::Display for FuseValue {
    /// Two upper-case hex digits, the width of 0xFF
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}
