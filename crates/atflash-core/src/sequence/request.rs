//! Programming request types
//!
//! A request is what the front-end hands over when the user presses start:
//! the target, the programmer and interface to reach it through, and what
//! to write. It is built fresh for every operation and never modified by
//! the planner.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::image::ProductionRegions;

/// Erase performed before programming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EraseMode {
    /// No erase
    #[default]
    None,
    /// Erase the whole chip first (`-c`)
    Chip,
    /// Erase only the memory being programmed (`-e`)
    Memory,
}

impl EraseMode {
    /// Tool flag for this erase mode, if any
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Chip => Some("-c"),
            Self::Memory => Some("-e"),
        }
    }
}

/// Input file format passed with `--format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Intel HEX
    Hex,
    /// ELF object
    Elf,
    /// Raw binary
    Bin,
}

impl FileFormat {
    /// Format name as the tool expects it
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Elf => "elf",
            Self::Bin => "bin",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" | "ihex" => Ok(Self::Hex),
            "elf" => Ok(Self::Elf),
            "bin" | "binary" => Ok(Self::Bin),
            _ => Err(format!("unknown file format: {}", s)),
        }
    }
}

/// Options applied to one `program` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramOptions {
    /// Read back and compare after programming (`--verify`)
    pub verify: bool,
    /// Erase before programming
    pub erase: EraseMode,
    /// Explicit input format (`--format`)
    pub format: Option<FileFormat>,
}

impl ProgramOptions {
    /// Flash defaults: verify after a chip erase
    pub fn flash() -> Self {
        Self {
            verify: true,
            erase: EraseMode::Chip,
            format: None,
        }
    }

    /// EEPROM defaults: verify, Intel HEX input
    pub fn eeprom() -> Self {
        Self {
            verify: true,
            erase: EraseMode::None,
            format: Some(FileFormat::Hex),
        }
    }
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            verify: true,
            erase: EraseMode::None,
            format: None,
        }
    }
}

/// A file to program into one memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    /// Path of the input file
    pub path: PathBuf,
    /// Options for the program invocation
    pub options: ProgramOptions,
}

impl FileArtifact {
    /// Create an artifact with the given options
    pub fn new(path: impl Into<PathBuf>, options: ProgramOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

/// Individual memories selected for programming
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryArtifacts {
    /// Fuse editor texts in fuse field order; concatenated into one hex
    /// string for the write
    pub fuses: Option<Vec<String>>,
    /// Flash contents
    pub flash: Option<FileArtifact>,
    /// EEPROM contents
    pub eeprom: Option<FileArtifact>,
    /// User signature contents
    pub user_signatures: Option<FileArtifact>,
}

/// A production image and the memories to take from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionImage {
    /// Path of the image
    pub path: PathBuf,
    /// Memories to program; empty means everything in the image
    pub regions: ProductionRegions,
    /// Options for the program invocation
    pub options: ProgramOptions,
}

impl ProductionImage {
    /// Create a production image entry with default options
    pub fn new(path: impl Into<PathBuf>, regions: ProductionRegions) -> Self {
        Self {
            path: path.into(),
            regions,
            options: ProgramOptions::default(),
        }
    }
}

/// What a request asks the tool to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Program individual memories from separate files
    Memory(MemoryArtifacts),
    /// Program from a single production image
    Production(ProductionImage),
    /// Program an application image, then a bootloader image
    ///
    /// The bootloader image sets the final fuses and lock bits, so it must
    /// be written after the application has been verified.
    ApplicationBootloader {
        /// Application image, programmed first
        application: ProductionImage,
        /// Bootloader image, programmed last
        bootloader: ProductionImage,
    },
}

/// Everything needed to plan one programming operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammingRequest {
    /// Target device name (any case; lower-cased for the tool)
    pub target: String,
    /// Programmer tool type (e.g. "atmelice")
    pub programmer: String,
    /// Physical interface (e.g. "ISP", "UPDI")
    pub interface: String,
    /// What to program
    pub operation: Operation,
}

impl ProgrammingRequest {
    /// Create a request
    pub fn new(
        target: impl Into<String>,
        programmer: impl Into<String>,
        interface: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            target: target.into(),
            programmer: programmer.into(),
            interface: interface.into(),
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_flags() {
        assert_eq!(EraseMode::None.flag(), None);
        assert_eq!(EraseMode::Chip.flag(), Some("-c"));
        assert_eq!(EraseMode::Memory.flag(), Some("-e"));
    }

    #[test]
    fn test_file_format_parse() {
        assert_eq!("HEX".parse::<FileFormat>().unwrap(), FileFormat::Hex);
        assert_eq!("binary".parse::<FileFormat>().unwrap(), FileFormat::Bin);
        assert!("srec".parse::<FileFormat>().is_err());
        assert_eq!(FileFormat::Elf.to_string(), "elf");
    }
}
