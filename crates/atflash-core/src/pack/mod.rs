//! Device pack support
//!
//! Microchip/Atmel device packs ship two kinds of XML files that matter
//! here:
//!
//! - `package.content` - one per pack, listing the devices it supports
//! - `<device>.atdf` - one per device, describing its address spaces,
//!   programming interfaces and fuse registers
//!
//! [`PackRepository`] answers questions about both without keeping any
//! parsed state between calls.
//!
//! ```ignore
//! let repo = PackRepository::new("./packs");
//! for fuse in repo.get_fuse_info("ATmega328P") {
//!     println!("{}: {}", fuse.name, fuse.description);
//! }
//! ```

mod atdf;
mod repository;
mod types;

pub use repository::{PackRepository, DESCRIPTOR_EXTENSION, PACKAGE_CONTENT};
pub use types::*;
