//! Error types for atflash-core
//!
//! Metadata queries never fail (they degrade to empty results), so the
//! errors here only cover image inspection and talking to the external
//! programming tool.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure while reading the section table of an image
#[derive(Debug, Error)]
pub enum ImageError {
    /// The image could not be opened or read
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is shorter than the fixed header region
    #[error("image header truncated: need 0x{needed:02X} bytes")]
    TruncatedHeader {
        /// Number of header bytes required
        needed: usize,
    },

    /// A structure referenced by the header lies past the end of the file
    #[error("{what} truncated at offset 0x{offset:X}")]
    Truncated {
        /// Which structure was being read
        what: &'static str,
        /// File offset the read started at
        offset: u64,
    },

    /// The section table geometry is unusable
    #[error("malformed section table: {0}")]
    MalformedSectionTable(&'static str),

    /// No string table entry was found in the section table
    #[error("no string table in section table")]
    NoStringTable,
}

/// Failure reported by a process runner
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The external tool could not be started
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program that was being started
        program: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// `wait` or `kill` was called with nothing running
    #[error("no invocation is running")]
    NotRunning,

    /// `launch` was called while an invocation is still running
    #[error("an invocation is already running")]
    Busy,

    /// The invocation ran longer than the configured timeout
    #[error("invocation timed out after {0:?}")]
    TimedOut(Duration),

    /// The runner cannot perform the requested operation
    #[error("operation not supported by this runner")]
    Unsupported,

    /// I/O error while supervising the process
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error type for atflash-core
#[derive(Debug, Error)]
pub enum Error {
    /// Image inspection failed
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Process runner failed
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
