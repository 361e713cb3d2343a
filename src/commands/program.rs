//! Programming commands
//!
//! All three modes end up in [`execute`]: plan the request, print or run
//! the plan, and turn the outcome into an exit status.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use atflash_core::image::{read_section_names, ProductionRegions};
use atflash_core::pack::{DeviceInfo, FuseValue, PackRepository};
use atflash_core::sequence::{
    plan, CommandPlan, Completion, EraseMode, FileArtifact, Invocation, MemoryArtifacts, Operation, Outcome,
    PlanOutcome, PlanWarning, ProductionImage, ProgramOptions, ProgrammingRequest,
    SequenceProgress, Sequencer,
};
use atflash_runner::{AtprogramConfig, AtprogramRunner};
use indicatif::{ProgressBar, ProgressStyle};

use super::{CmdResult, Device};
use crate::cli::{EraseArg, ProgramArgs, RegionArgs, RunArgs};
use crate::config::Settings;

/// Everything a programming command needs besides its own arguments
pub struct ProgramContext<'a> {
    pub repo: &'a PackRepository,
    pub settings: &'a Settings,
    pub device: Device,
    pub run: RunArgs,
}

// =============================================================================
// Progress reporting
// =============================================================================

/// Create a standard spinner style
fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {prefix} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress reporter with one spinner per invocation
pub struct IndicatifProgress {
    program: PathBuf,
    bar: Option<ProgressBar>,
    label: String,
}

impl IndicatifProgress {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            bar: None,
            label: String::new(),
        }
    }
}

impl SequenceProgress for IndicatifProgress {
    fn started(&mut self, index: usize, total: usize, invocation: &Invocation) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(create_spinner_style());
        pb.set_prefix(format!("[{}/{}]", index + 1, total));
        pb.set_message(invocation.label.clone());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.println(invocation.command_line(&self.program));
        self.label = invocation.label.clone();
        self.bar = Some(pb);
    }

    fn output(&mut self, line: &str) {
        match &self.bar {
            Some(pb) => pb.println(format!("  {}", line)),
            None => println!("  {}", line),
        }
    }

    fn finished(&mut self, _index: usize, completion: &Completion) {
        if let Some(pb) = self.bar.take() {
            if completion.is_success() {
                pb.finish_with_message(format!("{} done", self.label));
            } else {
                pb.abandon_with_message(format!("{} failed: {}", self.label, completion));
            }
        }
    }

    fn done(&mut self, outcome: &Outcome) {
        log::debug!("Operation finished: {:?}", outcome);
    }
}

// =============================================================================
// Option handling
// =============================================================================

fn erase_mode(arg: EraseArg) -> EraseMode {
    match arg {
        EraseArg::Chip => EraseMode::Chip,
        EraseArg::Memory => EraseMode::Memory,
        EraseArg::NoErase => EraseMode::None,
    }
}

/// Apply command line options over per-memory defaults
fn program_options(args: &ProgramArgs, defaults: ProgramOptions) -> ProgramOptions {
    ProgramOptions {
        verify: defaults.verify && !args.no_verify,
        erase: args.erase.map(erase_mode).unwrap_or(defaults.erase),
        format: args.format.or(defaults.format),
    }
}

/// Normalize fuse bytes to two upper-case hex digits each
///
/// Values that do not parse are passed on unchanged; planning rejects them.
fn normalize_fuses(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| match v.parse::<FuseValue>() {
            Ok(fuse) => fuse.to_string(),
            Err(_) => v.trim().to_string(),
        })
        .collect()
}

fn regions_from_args(args: &RegionArgs) -> ProductionRegions {
    [
        (args.fuses_region, ProductionRegions::FUSES),
        (args.flash_region, ProductionRegions::FLASH),
        (args.eeprom_region, ProductionRegions::EEPROM),
        (args.user_signatures_region, ProductionRegions::USER_SIGNATURES),
        (args.lockbits_region, ProductionRegions::LOCKBITS),
    ]
    .into_iter()
    .filter(|(selected, _)| *selected)
    .fold(ProductionRegions::empty(), |acc, (_, region)| acc | region)
}

/// Select the regions an image carries and the target has
///
/// A missing image selects nothing so that planning reports it.
fn auto_regions(
    info: Option<&DeviceInfo>,
    image: &Path,
) -> atflash_core::Result<ProductionRegions> {
    if !image.is_file() {
        return Ok(ProductionRegions::empty());
    }

    let names = read_section_names(image)?;
    let mut regions = ProductionRegions::from_sections(&names);
    match info {
        Some(info) => regions = regions.restrict_to(&info.memories),
        None => log::warn!("No descriptor for target, keeping all memories found in image"),
    }

    log::info!(
        "{}: selected {}",
        image.display(),
        if regions.is_empty() {
            "nothing".to_string()
        } else {
            regions.flags().join(" ")
        }
    );
    Ok(regions)
}

fn check_interface(info: Option<&DeviceInfo>, device: &Device) {
    if let Some(info) = info {
        if !info.supports_interface(&device.interface) {
            log::warn!(
                "{} does not list interface {} (supported: {})",
                info.name,
                device.interface,
                info.interfaces.join(", ")
            );
        }
    }
}

/// Ask on stdin unless `--yes` was given
fn confirm(warning: &PlanWarning, yes: bool) -> bool {
    if yes {
        log::info!("{}", warning);
        return true;
    }

    eprint!("{}\nDo you want to continue? [y/N] ", warning);
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// =============================================================================
// Commands
// =============================================================================

/// Program individual memories
pub fn cmd_program(
    ctx: &ProgramContext<'_>,
    fuses: Option<Vec<String>>,
    flash: Option<PathBuf>,
    eeprom: Option<PathBuf>,
    user_signatures: Option<PathBuf>,
    options: &ProgramArgs,
) -> CmdResult {
    let info = ctx.repo.device_info(&ctx.device.target);
    check_interface(info.as_ref(), &ctx.device);

    let fuses = fuses.map(|values| normalize_fuses(&values));
    if let (Some(values), Some(info)) = (&fuses, &info) {
        if values.len() != info.fuses.len() {
            log::warn!(
                "{} has {} fuse register(s), {} value(s) given",
                info.name,
                info.fuses.len(),
                values.len()
            );
        }
    }

    let artifacts = MemoryArtifacts {
        fuses,
        flash: flash.map(|p| FileArtifact::new(p, program_options(options, ProgramOptions::flash()))),
        eeprom: eeprom
            .map(|p| FileArtifact::new(p, program_options(options, ProgramOptions::eeprom()))),
        user_signatures: user_signatures
            .map(|p| FileArtifact::new(p, program_options(options, ProgramOptions::default()))),
    };

    execute(ctx, Operation::Memory(artifacts))
}

/// Program from a production image
pub fn cmd_production(
    ctx: &ProgramContext<'_>,
    file: PathBuf,
    regions: &RegionArgs,
    options: &ProgramArgs,
) -> CmdResult {
    let info = ctx.repo.device_info(&ctx.device.target);
    check_interface(info.as_ref(), &ctx.device);

    let selected = if regions.auto {
        auto_regions(info.as_ref(), &file)?
    } else {
        regions_from_args(regions)
    };

    let mut image = ProductionImage::new(file, selected);
    image.options = program_options(options, ProgramOptions::default());
    execute(ctx, Operation::Production(image))
}

/// Program an application image followed by a bootloader image
pub fn cmd_bootloader(
    ctx: &ProgramContext<'_>,
    application: PathBuf,
    bootloader: PathBuf,
    auto: bool,
    options: &ProgramArgs,
) -> CmdResult {
    let info = ctx.repo.device_info(&ctx.device.target);
    check_interface(info.as_ref(), &ctx.device);

    let image = |path: PathBuf| -> Result<ProductionImage, Box<dyn std::error::Error>> {
        let regions = if auto {
            auto_regions(info.as_ref(), &path)?
        } else {
            ProductionRegions::empty()
        };
        let mut image = ProductionImage::new(path, regions);
        image.options = program_options(options, ProgramOptions::default());
        Ok(image)
    };

    let operation = Operation::ApplicationBootloader {
        application: image(application)?,
        bootloader: image(bootloader)?,
    };
    execute(ctx, operation)
}

/// Plan a request, reporting every dropped artifact on `out`
///
/// Returns `None` when there is nothing to run.
fn prepare<W: Write>(
    request: &ProgrammingRequest,
    yes: bool,
    out: &mut W,
) -> Result<Option<CommandPlan>, Box<dyn std::error::Error>> {
    let (plan, messages) = match plan(request, |warning| confirm(warning, yes)) {
        PlanOutcome::Ready { plan, messages } => (plan, messages),
        PlanOutcome::Aborted(message) => return Err(message.to_string().into()),
        PlanOutcome::Cancelled => {
            println!("Cancelled");
            return Ok(None);
        }
    };

    for message in &messages {
        writeln!(out, "{}", message)?;
    }

    if !plan.is_empty() {
        return Ok(Some(plan));
    }
    match messages.len() {
        0 => {
            println!("Nothing to program");
            Ok(None)
        }
        _ => Err("nothing left to program".into()),
    }
}

/// Plan a request and run it
fn execute(ctx: &ProgramContext<'_>, operation: Operation) -> CmdResult {
    let request = ProgrammingRequest::new(
        ctx.device.target.as_str(),
        ctx.device.programmer.as_str(),
        ctx.device.interface.as_str(),
        operation,
    );

    let Some(plan) = prepare(&request, ctx.run.yes, &mut io::stderr())? else {
        return Ok(());
    };

    let program = &ctx.settings.atprogram;
    if ctx.run.dry_run {
        for invocation in plan.iter() {
            println!("{}", invocation.command_line(program));
        }
        return Ok(());
    }

    let mut config = AtprogramConfig::new(program);
    if let Some(timeout) = ctx.settings.timeout {
        config = config.with_timeout(timeout);
    }
    let mut runner = AtprogramRunner::new(config);
    let mut progress = IndicatifProgress::new(program);

    match Sequencer::new(&mut runner).run_to_completion(plan, &mut progress) {
        Some(Outcome::Succeeded { completed }) => {
            println!("Programming complete ({} step(s))", completed);
            Ok(())
        }
        Some(Outcome::Failed {
            label,
            completion,
            discarded,
            ..
        }) => {
            let mut message = format!("{} failed ({})", label, completion);
            if discarded > 0 {
                message.push_str(&format!(", {} step(s) not run", discarded));
            }
            Err(message.into())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atflash_core::sequence::FileFormat;

    #[test]
    fn test_normalize_fuses() {
        let values = ["ff", "0xd8", "c", "XY", ""].map(String::from);
        assert_eq!(normalize_fuses(&values), ["FF", "D8", "0C", "XY", ""]);
    }

    #[test]
    fn test_program_options() {
        let defaults = program_options(&ProgramArgs::default(), ProgramOptions::flash());
        assert_eq!(defaults, ProgramOptions::flash());

        let args = ProgramArgs {
            no_verify: true,
            erase: Some(EraseArg::NoErase),
            format: Some(FileFormat::Elf),
        };
        let options = program_options(&args, ProgramOptions::eeprom());
        assert!(!options.verify);
        assert_eq!(options.erase, EraseMode::None);
        assert_eq!(options.format, Some(FileFormat::Elf));
    }

    #[test]
    fn test_regions_from_args() {
        let args = RegionArgs {
            flash_region: true,
            lockbits_region: true,
            ..Default::default()
        };
        assert_eq!(
            regions_from_args(&args),
            ProductionRegions::FLASH | ProductionRegions::LOCKBITS
        );
        assert!(regions_from_args(&RegionArgs::default()).is_empty());
    }

    #[test]
    fn test_auto_regions_missing_image() {
        let regions = auto_regions(None, Path::new("/nonexistent/prod.elf")).unwrap();
        assert!(regions.is_empty());
    }

    fn memory_request(artifacts: MemoryArtifacts) -> ProgrammingRequest {
        ProgrammingRequest::new("atmega328p", "atmelice", "isp", Operation::Memory(artifacts))
    }

    #[test]
    fn test_prepare_reports_dropped_fuses() {
        let dir = tempfile::tempdir().unwrap();
        let flash = dir.path().join("app.hex");
        std::fs::write(&flash, "").unwrap();

        let request = memory_request(MemoryArtifacts {
            fuses: Some(vec!["FF".into(), "D8".into(), "".into()]),
            flash: Some(FileArtifact::new(&flash, ProgramOptions::flash())),
            ..Default::default()
        });

        let mut out = Vec::new();
        let plan = prepare(&request, false, &mut out).unwrap().unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "All fuses must be set!\n");
    }

    #[test]
    fn test_prepare_fails_when_everything_dropped() {
        let request = memory_request(MemoryArtifacts {
            flash: Some(FileArtifact::new(
                "/nonexistent/app.hex",
                ProgramOptions::flash(),
            )),
            eeprom: Some(FileArtifact::new(
                "/nonexistent/data.eep",
                ProgramOptions::eeprom(),
            )),
            ..Default::default()
        });

        let mut out = Vec::new();
        assert!(prepare(&request, false, &mut out).is_err());
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l.ends_with("file does not exist!")));
    }

    #[test]
    fn test_confirm_yes_skips_prompt() {
        let warning = PlanWarning::FullImage {
            artifact: atflash_core::sequence::Artifact::Production,
            path: PathBuf::from("prod.elf"),
        };
        assert!(confirm(&warning, true));
    }
}
