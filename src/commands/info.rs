//! Target information command

use atflash_core::pack::PackRepository;

use super::CmdResult;

/// Print memories, interfaces and fuse registers of a target
pub fn cmd_info(repo: &PackRepository, target: &str) -> CmdResult {
    let path = repo
        .target_file(target)
        .ok_or_else(|| format!("No device descriptor found for {}", target))?;
    let info = repo
        .device_info(target)
        .ok_or_else(|| format!("{} does not describe {}", path.display(), target))?;

    println!("Device:      {}", info.name);
    println!("Descriptor:  {}", path.display());
    println!("Interfaces:  {}", info.interfaces.join(", "));
    println!("Memories:    {}", info.memories.join(", "));

    if info.fuses.is_empty() {
        println!("Fuses:       none");
        return Ok(());
    }

    println!("Fuses:");
    for (i, fuse) in info.fuses.iter().enumerate() {
        println!("  {:>2}  {:<12} {}", i, fuse.name, fuse.description);
    }
    Ok(())
}
