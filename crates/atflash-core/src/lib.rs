//! atflash-core - Core library for driving atprogram
//!
//! This crate contains everything the front-end needs that is not user
//! interface: discovering devices in installed device packs, peeking at
//! the sections of a production image, and turning a programming request
//! into an ordered list of `atprogram` invocations that are run one at a
//! time.
//!
//! # Modules
//!
//! - [`pack`] - Device pack repository (`package.content` catalogs and
//!   `.atdf` device descriptors)
//! - [`image`] - Section table reader for production images
//! - [`sequence`] - Request planning and the sequencing state machine
//!
//! # Example
//!
//! ```ignore
//! use atflash_core::pack::PackRepository;
//!
//! let repo = PackRepository::new("./packs");
//! for target in repo.list_targets() {
//!     println!("{}", target);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod image;
pub mod pack;
pub mod sequence;

pub use error::{Error, Result};
