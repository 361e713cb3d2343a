//! Process runner abstraction
//!
//! The sequencer never spawns anything itself. It hands each [`Invocation`]
//! to a [`ProcessRunner`], which is owned by the caller, and is told about
//! the completion afterwards.

use std::fmt;
use std::time::Duration;

use super::plan::Invocation;
use crate::error::RunnerError;

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The process exited with this code
    Exited(i32),
    /// The process crashed, was killed, or could not be supervised
    Error(String),
}

impl Completion {
    /// Only a zero exit code counts as success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {}", code),
            Self::Error(reason) => f.write_str(reason),
        }
    }
}

impl From<RunnerError> for Completion {
    fn from(e: RunnerError) -> Self {
        Self::Error(e.to_string())
    }
}

/// Something that can run tool invocations one at a time
pub trait ProcessRunner {
    /// Start an invocation without waiting for it
    fn launch(&mut self, invocation: &Invocation) -> Result<(), RunnerError>;

    /// Block until the running invocation ends
    ///
    /// Output lines are passed to `output` as they arrive.
    fn wait(&mut self, output: &mut dyn FnMut(&str)) -> Result<Completion, RunnerError>;

    /// Terminate the running invocation
    fn kill(&mut self) -> Result<(), RunnerError> {
        Err(RunnerError::Unsupported)
    }

    /// Longest time an invocation may run; `None` disables the limit
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &mut R {
    fn launch(&mut self, invocation: &Invocation) -> Result<(), RunnerError> {
        (**self).launch(invocation)
    }

    fn wait(&mut self, output: &mut dyn FnMut(&str)) -> Result<Completion, RunnerError> {
        (**self).wait(output)
    }

    fn kill(&mut self) -> Result<(), RunnerError> {
        (**self).kill()
    }

    fn timeout(&self) -> Option<Duration> {
        (**self).timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_success() {
        assert!(Completion::Exited(0).is_success());
        assert!(!Completion::Exited(1).is_success());
        assert!(!Completion::Error("crashed".into()).is_success());
        assert_eq!(Completion::Exited(2).to_string(), "exit code 2");
        assert_eq!(
            Completion::from(RunnerError::NotRunning),
            Completion::Error("no invocation is running".into())
        );
    }
}
