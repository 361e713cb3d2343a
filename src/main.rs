//! atflash - Command line front-end for atprogram
//!
//! Programs fuses, flash, EEPROM and production images on AVR devices by
//! sequencing invocations of Microchip's `atprogram` tool.
//!
//! # Architecture
//!
//! - **Device packs** are scanned for `package.content` catalogs and
//!   `<device>.atdf` descriptors to list targets and their memories,
//!   interfaces and fuse registers
//! - **Production images** are inspected only as far as their section names
//!   to preselect the memories to program
//! - **Requests** are planned into an ordered list of atprogram invocations,
//!   which run one at a time and stop at the first failure

mod cli;
mod commands;
mod config;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use commands::program::{self, ProgramContext};
use commands::Device;
use config::{FileConfig, Settings};

use atflash_core::pack::PackRepository;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let cwd = std::env::current_dir()?;
    let mut settings = Settings::from(FileConfig::discover(cli.config.as_deref(), &cwd)?);
    if let Some(packs) = cli.packs {
        settings.packs = packs;
    }
    if let Some(atprogram) = cli.atprogram {
        settings.atprogram = atprogram;
    }
    log::debug!("Settings: {:?}", settings);

    let repo = PackRepository::new(&settings.packs);
    if !repo.is_valid() {
        log::debug!(
            "Device pack directory {} is not usable",
            settings.packs.display()
        );
    }

    let context = |device: Device, run: cli::RunArgs| ProgramContext {
        repo: &repo,
        settings: &settings,
        device,
        run,
    };

    match cli.command {
        Commands::ListTargets { filter } => commands::list_targets(&repo, filter.as_deref()),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
        Commands::Info { device } => {
            let device = Device::resolve(&device, &settings);
            commands::cmd_info(&repo, &device.target)
        }
        Commands::Sections { image } => commands::cmd_sections(&image),
        Commands::Program {
            device,
            fuses,
            flash,
            eeprom,
            user_signatures,
            options,
            run,
        } => {
            let ctx = context(Device::resolve(&device, &settings), run);
            program::cmd_program(&ctx, fuses, flash, eeprom, user_signatures, &options)
        }
        Commands::Production {
            device,
            file,
            regions,
            options,
            run,
        } => {
            let ctx = context(Device::resolve(&device, &settings), run);
            program::cmd_production(&ctx, file, &regions, &options)
        }
        Commands::Bootloader {
            device,
            application,
            bootloader,
            auto,
            options,
            run,
        } => {
            let ctx = context(Device::resolve(&device, &settings), run);
            program::cmd_bootloader(&ctx, application, bootloader, auto, &options)
        }
    }
}
