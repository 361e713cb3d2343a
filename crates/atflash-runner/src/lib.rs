//! atflash-runner - Run atprogram invocations as child processes
//!
//! This crate provides the [`ProcessRunner`] used outside of tests: every
//! invocation becomes one `atprogram` child process, its stdout and stderr
//! are merged line by line, and only its exit code decides success.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use atflash_core::sequence::{NoProgress, Sequencer};
//! use atflash_runner::{AtprogramConfig, AtprogramRunner};
//!
//! let config = AtprogramConfig::new("atprogram").with_timeout(Duration::from_secs(120));
//! let mut runner = AtprogramRunner::new(config);
//! let mut sequencer = Sequencer::new(&mut runner);
//! # let plan = atflash_core::sequence::CommandPlan::new();
//! let outcome = sequencer.run_to_completion(plan, &mut NoProgress);
//! ```
//!
//! [`ProcessRunner`]: atflash_core::sequence::ProcessRunner

#![warn(missing_docs)]

pub mod process;

pub use atflash_core::error::RunnerError;
pub use process::{AtprogramConfig, AtprogramRunner, DEFAULT_PROGRAM};
