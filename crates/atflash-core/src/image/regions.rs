//! Memory regions carried by a production image

use bitflags::bitflags;

use crate::pack::memories;

bitflags! {
    /// Memories to program from a production image
    ///
    /// An empty set means "program everything the image contains", which
    /// the tool does when no memory flag is passed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProductionRegions: u8 {
        /// Fuse bytes (`-fs`)
        const FUSES           = 1 << 0;
        /// Program flash (`-fl`)
        const FLASH           = 1 << 1;
        /// Data EEPROM (`-ee`)
        const EEPROM          = 1 << 2;
        /// User signature rows (`-us`)
        const USER_SIGNATURES = 1 << 3;
        /// Lock bits (`-lb`)
        const LOCKBITS        = 1 << 4;
    }
}

/// Section name to region mapping used by avr-gcc linker scripts
const SECTION_REGIONS: [(&str, ProductionRegions); 5] = [
    (".text", ProductionRegions::FLASH),
    (".eeprom", ProductionRegions::EEPROM),
    (".fuse", ProductionRegions::FUSES),
    (".lock", ProductionRegions::LOCKBITS),
    (".user_signatures", ProductionRegions::USER_SIGNATURES),
];

impl ProductionRegions {
    /// Regions present in an image, judged by its section names
    pub fn from_sections<S: AsRef<str>>(sections: &[S]) -> Self {
        sections
            .iter()
            .filter_map(|s| {
                SECTION_REGIONS
                    .iter()
                    .find(|(name, _)| *name == s.as_ref())
                    .map(|&(_, region)| region)
            })
            .fold(Self::empty(), |acc, region| acc | region)
    }

    /// Drop regions the target device does not have
    ///
    /// `device_memories` are the address space names from the device
    /// descriptor. Flash is always kept; devices describe it as "prog".
    pub fn restrict_to<S: AsRef<str>>(self, device_memories: &[S]) -> Self {
        let has = |name: &str| device_memories.iter().any(|m| m.as_ref() == name);

        let mut regions = self;
        for (region, memory) in [
            (Self::FUSES, memories::FUSES),
            (Self::EEPROM, memories::EEPROM),
            (Self::USER_SIGNATURES, memories::USER_SIGNATURES),
            (Self::LOCKBITS, memories::LOCKBITS),
        ] {
            if !has(memory) {
                regions.remove(region);
            }
        }
        regions
    }

    /// Tool flags for these regions, in the order the tool documents them
    pub fn flags(self) -> Vec<&'static str> {
        [
            (Self::FUSES, "-fs"),
            (Self::FLASH, "-fl"),
            (Self::EEPROM, "-ee"),
            (Self::USER_SIGNATURES, "-us"),
            (Self::LOCKBITS, "-lb"),
        ]
        .into_iter()
        .filter(|(region, _)| self.contains(*region))
        .map(|(_, flag)| flag)
        .collect()
    }
}

impl Default for ProductionRegions {
    fn default() -> Self {
        Self::empty()
    }
}
