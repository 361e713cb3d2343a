//! Production image inspection
//!
//! Only the section names of an image are looked at. They are enough to
//! tell which memories (flash, EEPROM, fuses, lock bits, user signatures)
//! a production image carries, so the front-end can preselect them.
//!
//! ```ignore
//! let names = read_section_names("app.elf")?;
//! let regions = ProductionRegions::from_sections(&names);
//! ```

mod regions;
mod sections;

pub use regions::ProductionRegions;
pub use sections::{read_section_names, read_sections, section_names_from_bytes, HEADER_SIZE};
