//! Turning a request into tool invocations

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use super::request::{
    FileArtifact, MemoryArtifacts, Operation, ProductionImage, ProgramOptions, ProgrammingRequest,
};

/// Number of hex characters a complete fuse value string must have
pub const FUSE_HEX_LEN: usize = 6;

/// One run of the external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Short description shown while the invocation runs
    pub label: String,
    /// Complete argument vector, program name excluded
    pub args: Vec<String>,
}

impl Invocation {
    /// Command line as it would be typed in a shell, for echoing
    pub fn command_line(&self, program: &Path) -> String {
        let mut line = quote(&program.display().to_string());
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

/// Ordered queue of invocations for one operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPlan {
    invocations: VecDeque<Invocation>,
}

impl CommandPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an invocation
    pub fn push(&mut self, invocation: Invocation) {
        self.invocations.push_back(invocation);
    }

    /// Number of invocations
    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    /// Whether nothing would run
    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Invocations in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Invocation> {
        self.invocations.iter()
    }

    pub(crate) fn into_queue(self) -> VecDeque<Invocation> {
        self.invocations
    }
}

/// Kind of artifact a plan message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Fuse values
    Fuses,
    /// Flash file
    Flash,
    /// EEPROM file
    Eeprom,
    /// User signature file
    UserSignatures,
    /// Production image
    Production,
    /// Application image of the bootloader mode
    Application,
    /// Bootloader image
    Bootloader,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fuses => "Fuses",
            Self::Flash => "Flash",
            Self::Eeprom => "EEPROM",
            Self::UserSignatures => "User signature",
            Self::Production => "Production",
            Self::Application => "Application",
            Self::Bootloader => "Bootloader",
        })
    }
}

/// User-facing problem found while planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanMessage {
    /// The fuse values do not form a complete hex string
    FusesIncomplete {
        /// The concatenated value that was rejected
        value: String,
    },
    /// An input file is missing or is not a regular file
    MissingFile {
        /// Which artifact the file belongs to
        artifact: Artifact,
        /// The path that was checked
        path: PathBuf,
    },
}

impl fmt::Display for PlanMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FusesIncomplete { .. } => f.write_str("All fuses must be set!"),
            Self::MissingFile { artifact, .. } => write!(f, "{} file does not exist!", artifact),
        }
    }
}

/// Condition that needs the user's consent before planning continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    /// No region selected, so the whole image would be programmed
    FullImage {
        /// Which image this is about
        artifact: Artifact,
        /// Path of the image
        path: PathBuf,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullImage { artifact, path } => write!(
                f,
                "No memory selected for the {} image {}; its full contents will be programmed",
                artifact.to_string().to_lowercase(),
                path.display()
            ),
        }
    }
}

/// Result of planning a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// A plan is ready; `messages` lists artifacts that were dropped
    Ready {
        /// Invocations to run
        plan: CommandPlan,
        /// Problems that removed individual artifacts
        messages: Vec<PlanMessage>,
    },
    /// Nothing will run because of this problem
    Aborted(PlanMessage),
    /// The user declined a warning
    Cancelled,
}

/// Builds argument vectors sharing the common prefix
struct ArgsBuilder<'a> {
    request: &'a ProgrammingRequest,
}

impl ArgsBuilder<'_> {
    fn base(&self) -> Vec<String> {
        vec![
            "-v".into(),
            "-t".into(),
            self.request.programmer.clone(),
            "-i".into(),
            self.request.interface.clone(),
            "-d".into(),
            self.request.target.to_lowercase(),
        ]
    }

    fn write_fuses(&self, hex: &str) -> Vec<String> {
        let mut args = self.base();
        args.extend(["write", "-fs", "--values"].map(String::from));
        args.push(hex.to_string());
        args
    }

    fn program(&self, options: &ProgramOptions, memory_flags: &[&str], path: &Path) -> Vec<String> {
        let mut args = self.base();
        args.push("program".into());
        if options.verify {
            args.push("--verify".into());
        }
        if let Some(flag) = options.erase.flag() {
            args.push(flag.into());
        }
        if let Some(format) = options.format {
            args.push("--format".into());
            args.push(format.as_str().into());
        }
        args.extend(memory_flags.iter().map(|f| f.to_string()));
        args.push("-f".into());
        args.push(path.display().to_string());
        args
    }
}

/// Concatenate fuse editor texts into the value string for `--values`
///
/// Fails with the rejected string unless it is exactly [`FUSE_HEX_LEN`] hex
/// digits.
fn fuse_values(fuses: &[String]) -> Result<String, String> {
    let value: String = fuses.iter().map(|f| f.trim()).collect();
    if value.len() == FUSE_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(value)
    } else {
        Err(value)
    }
}

fn plan_memories(
    builder: &ArgsBuilder<'_>,
    artifacts: &MemoryArtifacts,
    plan: &mut CommandPlan,
    messages: &mut Vec<PlanMessage>,
) {
    if let Some(fuses) = &artifacts.fuses {
        match fuse_values(fuses) {
            Ok(hex) => plan.push(Invocation {
                label: "Write fuses".into(),
                args: builder.write_fuses(&hex),
            }),
            Err(value) => {
                log::warn!("Dropping fuse write, incomplete value {:?}", value);
                messages.push(PlanMessage::FusesIncomplete { value });
            }
        }
    }

    let files: [(&Option<FileArtifact>, Artifact, &str, &str); 3] = [
        (&artifacts.flash, Artifact::Flash, "-fl", "Program flash"),
        (&artifacts.eeprom, Artifact::Eeprom, "-ee", "Program EEPROM"),
        (
            &artifacts.user_signatures,
            Artifact::UserSignatures,
            "-us",
            "Program user signatures",
        ),
    ];

    for (file, artifact, flag, label) in files {
        let Some(file) = file else { continue };
        if !file.path.is_file() {
            log::warn!("Dropping {}: {} not found", label, file.path.display());
            messages.push(PlanMessage::MissingFile {
                artifact,
                path: file.path.clone(),
            });
            continue;
        }
        plan.push(Invocation {
            label: label.into(),
            args: builder.program(&file.options, &[flag], &file.path),
        });
    }
}

/// Check and build the invocation for one production image
///
/// `Err(None)` means the user declined the full-image warning.
fn plan_image<F>(
    builder: &ArgsBuilder<'_>,
    image: &ProductionImage,
    artifact: Artifact,
    confirm: &mut F,
) -> Result<Invocation, Option<PlanMessage>>
where
    F: FnMut(&PlanWarning) -> bool,
{
    if !image.path.is_file() {
        return Err(Some(PlanMessage::MissingFile {
            artifact,
            path: image.path.clone(),
        }));
    }

    if image.regions.is_empty() {
        let warning = PlanWarning::FullImage {
            artifact,
            path: image.path.clone(),
        };
        if !confirm(&warning) {
            return Err(None);
        }
    }

    Ok(Invocation {
        label: format!("Program {} image", artifact.to_string().to_lowercase()),
        args: builder.program(&image.options, &image.regions.flags(), &image.path),
    })
}

/// Build the command plan for a request
///
/// In memory mode a problem with one artifact only drops that artifact.
/// In production and bootloader mode any missing file aborts the whole
/// plan. `confirm` is asked about images with no region selected; a `false`
/// answer cancels planning.
pub fn plan<F>(request: &ProgrammingRequest, mut confirm: F) -> PlanOutcome
where
    F: FnMut(&PlanWarning) -> bool,
{
    let builder = ArgsBuilder { request };
    let mut plan = CommandPlan::new();
    let mut messages = Vec::new();

    let images: Vec<(&ProductionImage, Artifact)> = match &request.operation {
        Operation::Memory(artifacts) => {
            plan_memories(&builder, artifacts, &mut plan, &mut messages);
            Vec::new()
        }
        Operation::Production(image) => vec![(image, Artifact::Production)],
        Operation::ApplicationBootloader {
            application,
            bootloader,
        } => vec![
            (application, Artifact::Application),
            (bootloader, Artifact::Bootloader),
        ],
    };

    for (image, artifact) in images {
        match plan_image(&builder, image, artifact, &mut confirm) {
            Ok(invocation) => plan.push(invocation),
            Err(Some(message)) => {
                log::warn!("Aborting: {}", message);
                return PlanOutcome::Aborted(message);
            }
            Err(None) => {
                log::info!("Full image programming declined");
                return PlanOutcome::Cancelled;
            }
        }
    }

    log::debug!(
        "Planned {} invocation(s), {} dropped artifact(s)",
        plan.len(),
        messages.len()
    );
    PlanOutcome::Ready { plan, messages }
}
