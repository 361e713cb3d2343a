//! CLI argument parsing

use crate::programmers;
use atflash_core::sequence::FileFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer tool type [available: {}]",
        programmers::programmer_names_short()
    )
}

/// Generate dynamic help text for the interface argument
fn interface_help() -> String {
    format!(
        "Programming interface [available: {}]",
        programmers::interface_names_short()
    )
}

#[derive(Parser)]
#[command(name = "atflash")]
#[command(author, version, about = "Program AVR fuses, flash, EEPROM and production images through atprogram", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./atflash.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing installed device packs
    #[arg(long, global = true)]
    pub packs: Option<PathBuf>,

    /// Path to the atprogram executable
    #[arg(long, global = true)]
    pub atprogram: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target selection shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Target device (e.g. ATmega328P)
    #[arg(short = 'd', long)]
    pub target: Option<String>,

    #[arg(short = 't', long, help = programmer_help())]
    pub programmer: Option<String>,

    #[arg(short, long, help = interface_help())]
    pub interface: Option<String>,
}

/// Erase choice for `--erase`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EraseArg {
    /// Erase the whole chip before programming
    Chip,
    /// Erase only the memory being programmed
    Memory,
    /// Do not erase
    #[value(name = "none")]
    NoErase,
}

/// Options of the `program` invocations
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ProgramArgs {
    /// Skip the read-back verification
    #[arg(long)]
    pub no_verify: bool,

    /// Erase before programming (flash defaults to chip, others to none)
    #[arg(long, value_enum)]
    pub erase: Option<EraseArg>,

    /// Input file format [hex, elf, bin]
    #[arg(long)]
    pub format: Option<FileFormat>,
}

/// How the planned invocations are carried out
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Print the invocations instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long)]
    pub yes: bool,
}

/// Memories to take from a production image
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RegionArgs {
    /// Program the fuses from the image
    #[arg(long)]
    pub fuses_region: bool,

    /// Program flash from the image
    #[arg(long)]
    pub flash_region: bool,

    /// Program EEPROM from the image
    #[arg(long)]
    pub eeprom_region: bool,

    /// Program user signatures from the image
    #[arg(long)]
    pub user_signatures_region: bool,

    /// Program lock bits from the image
    #[arg(long)]
    pub lockbits_region: bool,

    /// Select the memories the image contains and the target has
    #[arg(long, conflicts_with_all = ["fuses_region", "flash_region", "eeprom_region", "user_signatures_region", "lockbits_region"])]
    pub auto: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List targets found in the device packs
    ListTargets {
        /// Only show targets containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List supported programmers and interfaces
    ListProgrammers,

    /// Show memories, interfaces and fuses of a target
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Show the sections of a production image
    Sections {
        /// Image file
        #[arg(short = 'f', long)]
        image: PathBuf,
    },

    /// Program individual memories from separate files
    Program {
        #[command(flatten)]
        device: DeviceArgs,

        /// Fuse bytes in register order as hex, comma-separated (e.g. FF,D8,CB)
        #[arg(long, value_delimiter = ',')]
        fuses: Option<Vec<String>>,

        /// Flash contents
        #[arg(long)]
        flash: Option<PathBuf>,

        /// EEPROM contents
        #[arg(long)]
        eeprom: Option<PathBuf>,

        /// User signature contents
        #[arg(long)]
        user_signatures: Option<PathBuf>,

        #[command(flatten)]
        options: ProgramArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Program from a single production image
    Production {
        #[command(flatten)]
        device: DeviceArgs,

        /// Production image
        #[arg(short = 'f', long)]
        file: PathBuf,

        #[command(flatten)]
        regions: RegionArgs,

        #[command(flatten)]
        options: ProgramArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Program an application image followed by a bootloader image
    Bootloader {
        #[command(flatten)]
        device: DeviceArgs,

        /// Application image, programmed first
        #[arg(long)]
        application: PathBuf,

        /// Bootloader image, programmed after the application
        #[arg(long)]
        bootloader: PathBuf,

        /// Select each image's memories from its sections
        #[arg(long)]
        auto: bool,

        #[command(flatten)]
        options: ProgramArgs,

        #[command(flatten)]
        run: RunArgs,
    },
}
