//! Image section listing

use std::path::Path;

use atflash_core::image::{read_section_names, ProductionRegions};

use super::CmdResult;

fn region_names(regions: ProductionRegions) -> Vec<&'static str> {
    regions
        .iter_names()
        .map(|(name, _)| match name {
            "FUSES" => "fuses",
            "FLASH" => "flash",
            "EEPROM" => "eeprom",
            "USER_SIGNATURES" => "user signatures",
            "LOCKBITS" => "lock bits",
            other => other,
        })
        .collect()
}

/// Print the section names of an image and the memories they imply
pub fn cmd_sections(image: &Path) -> CmdResult {
    let names = read_section_names(image).map_err(atflash_core::Error::from)?;

    println!("Sections in {}:", image.display());
    for name in &names {
        println!("  {}", name);
    }

    let regions = ProductionRegions::from_sections(&names);
    if regions.is_empty() {
        println!("No programmable memories found");
    } else {
        println!("Memories: {}", region_names(regions).join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_names() {
        let regions = ProductionRegions::FLASH | ProductionRegions::LOCKBITS;
        assert_eq!(region_names(regions), ["flash", "lock bits"]);
    }
}
