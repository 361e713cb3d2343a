//! Command sequencing
//!
//! A [`ProgrammingRequest`] is turned into a [`CommandPlan`] by [`plan`],
//! and a [`Sequencer`] runs the plan through a [`ProcessRunner`], one
//! invocation at a time, stopping at the first failure.
//!
//! ```ignore
//! let request = ProgrammingRequest::new("ATmega32U4", "atmelice", "ISP", op);
//! if let PlanOutcome::Ready { plan, .. } = plan(&request, |_| true) {
//!     let outcome = Sequencer::new(&mut runner).run_to_completion(plan, &mut NoProgress);
//! }
//! ```

mod plan;
mod request;
mod runner;
mod sequencer;

pub use plan::{
    plan, Artifact, CommandPlan, Invocation, PlanMessage, PlanOutcome, PlanWarning, FUSE_HEX_LEN,
};
pub use request::{
    EraseMode, FileArtifact, FileFormat, MemoryArtifacts, Operation, ProductionImage,
    ProgramOptions, ProgrammingRequest,
};
pub use runner::{Completion, ProcessRunner};
pub use sequencer::{NoProgress, Outcome, SequenceProgress, Sequencer, SequencerState, StartOutcome};
