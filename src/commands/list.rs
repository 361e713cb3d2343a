//! List commands implementation

use atflash_core::pack::PackRepository;

use super::CmdResult;
use crate::programmers::{self, PROGRAMMERS};

/// List all supported programmers and interfaces
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for programmer in PROGRAMMERS {
        println!("  {:<14} - {}", programmer.name, programmer.description);
    }
    println!();
    println!("Interfaces: {}", programmers::interface_names_short());
}

/// List targets from the device packs, optionally filtered
pub fn list_targets(repo: &PackRepository, filter: Option<&str>) -> CmdResult {
    if !repo.is_valid() {
        return Err(match repo.root() {
            Some(root) => format!("Device pack directory not usable: {}", root.display()),
            None => "No device pack directory configured".to_string(),
        }
        .into());
    }

    let targets: Vec<String> = match filter {
        Some(needle) => repo.find_targets(needle),
        None => repo.list_targets().into_iter().collect(),
    };

    if targets.is_empty() {
        println!("No targets found");
        return Ok(());
    }

    for target in &targets {
        println!("{}", target);
    }
    log::info!("{} target(s)", targets.len());
    Ok(())
}
