//! Sequential execution of a command plan
//!
//! The sequencer is a small state machine. [`Sequencer::start`] launches the
//! first invocation; every completion is fed back through
//! [`Sequencer::on_finished`], which either launches the next invocation or
//! ends the operation. The first failure discards everything still queued.

use std::collections::VecDeque;

use super::plan::{CommandPlan, Invocation};
use super::runner::{Completion, ProcessRunner};

/// Observer for sequencing progress
pub trait SequenceProgress {
    /// An invocation is about to be launched
    fn started(&mut self, index: usize, total: usize, invocation: &Invocation);

    /// The running invocation printed a line
    fn output(&mut self, line: &str);

    /// An invocation ended
    fn finished(&mut self, index: usize, completion: &Completion);

    /// The whole operation ended; called exactly once per operation
    fn done(&mut self, outcome: &Outcome);
}

/// No-op progress implementation
pub struct NoProgress;

impl SequenceProgress for NoProgress {
    fn started(&mut self, _index: usize, _total: usize, _invocation: &Invocation) {}
    fn output(&mut self, _line: &str) {}
    fn finished(&mut self, _index: usize, _completion: &Completion) {}
    fn done(&mut self, _outcome: &Outcome) {}
}

/// Sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// No operation in progress
    Idle,
    /// An invocation is running
    Running,
}

/// Aggregated result of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every invocation exited with code zero
    Succeeded {
        /// Number of invocations run
        completed: usize,
    },
    /// An invocation failed and the rest of the plan was dropped
    Failed {
        /// Position of the failed invocation in the plan
        index: usize,
        /// Its label
        label: String,
        /// How it ended
        completion: Completion,
        /// Invocations that never ran
        discarded: usize,
    },
}

impl Outcome {
    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Result of [`Sequencer::start`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The first invocation is running
    Started,
    /// The plan was empty; nothing happened
    NothingToDo,
    /// An operation is already running; the plan was ignored
    Rejected,
    /// The first invocation could not be launched
    Finished(Outcome),
}

/// Runs a plan one invocation at a time
pub struct Sequencer<R> {
    runner: R,
    queue: VecDeque<Invocation>,
    current: Option<(usize, Invocation)>,
    total: usize,
}

impl<R: ProcessRunner> Sequencer<R> {
    /// Create an idle sequencer driving `runner`
    ///
    /// Pass `&mut runner` to keep ownership of the runner outside.
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            queue: VecDeque::new(),
            current: None,
            total: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> SequencerState {
        if self.current.is_some() {
            SequencerState::Running
        } else {
            SequencerState::Idle
        }
    }

    /// Whether an operation is in progress
    pub fn is_running(&self) -> bool {
        self.state() == SequencerState::Running
    }

    /// Invocations queued behind the running one
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// The runner
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The runner, mutably
    pub fn runner_mut(&mut self) -> &mut R {
        &mut self.runner
    }

    /// Start running a plan
    pub fn start(&mut self, plan: CommandPlan, progress: &mut dyn SequenceProgress) -> StartOutcome {
        if self.is_running() {
            log::warn!("Operation already running, ignoring new plan");
            return StartOutcome::Rejected;
        }
        if plan.is_empty() {
            log::info!("Nothing to do");
            return StartOutcome::NothingToDo;
        }

        self.total = plan.len();
        self.queue = plan.into_queue();
        match self.launch_next(progress) {
            None => StartOutcome::Started,
            Some(outcome) => StartOutcome::Finished(outcome),
        }
    }

    /// Report that the running invocation ended
    ///
    /// Returns the operation outcome once it is over, `None` while it
    /// continues. A completion arriving while idle is ignored.
    pub fn on_finished(
        &mut self,
        completion: Completion,
        progress: &mut dyn SequenceProgress,
    ) -> Option<Outcome> {
        let Some((index, invocation)) = self.current.take() else {
            log::warn!("Completion received with nothing running");
            return None;
        };

        progress.finished(index, &completion);
        if !completion.is_success() {
            return Some(self.fail(index, invocation, completion, progress));
        }

        log::debug!("{} finished", invocation.label);
        self.launch_next(progress)
    }

    /// Run a plan to the end, blocking on the runner between invocations
    ///
    /// Returns `None` if the plan was empty or an operation was already
    /// running.
    pub fn run_to_completion(
        &mut self,
        plan: CommandPlan,
        progress: &mut dyn SequenceProgress,
    ) -> Option<Outcome> {
        match self.start(plan, progress) {
            StartOutcome::Started => {}
            StartOutcome::Finished(outcome) => return Some(outcome),
            StartOutcome::NothingToDo | StartOutcome::Rejected => return None,
        }

        loop {
            let completion = self
                .runner
                .wait(&mut |line: &str| progress.output(line))
                .unwrap_or_else(Completion::from);
            if let Some(outcome) = self.on_finished(completion, progress) {
                return Some(outcome);
            }
        }
    }

    /// Launch the next queued invocation, or finish if there is none
    fn launch_next(&mut self, progress: &mut dyn SequenceProgress) -> Option<Outcome> {
        let Some(invocation) = self.queue.pop_front() else {
            return Some(self.finish(
                Outcome::Succeeded {
                    completed: self.total,
                },
                progress,
            ));
        };

        let index = self.total - self.queue.len() - 1;
        progress.started(index, self.total, &invocation);
        log::info!("[{}/{}] {}", index + 1, self.total, invocation.label);

        match self.runner.launch(&invocation) {
            Ok(()) => {
                self.current = Some((index, invocation));
                None
            }
            Err(e) => {
                let completion = Completion::from(e);
                progress.finished(index, &completion);
                Some(self.fail(index, invocation, completion, progress))
            }
        }
    }

    fn fail(
        &mut self,
        index: usize,
        invocation: Invocation,
        completion: Completion,
        progress: &mut dyn SequenceProgress,
    ) -> Outcome {
        let discarded = self.queue.len();
        self.queue.clear();
        log::error!("{} failed: {}", invocation.label, completion);
        self.finish(
            Outcome::Failed {
                index,
                label: invocation.label,
                completion,
                discarded,
            },
            progress,
        )
    }

    fn finish(&mut self, outcome: Outcome, progress: &mut dyn SequenceProgress) -> Outcome {
        self.current = None;
        self.total = 0;
        if outcome.is_success() {
            log::info!("Operation succeeded");
        }
        progress.done(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunnerError;
    use std::io;

    /// Runner that answers from a script instead of spawning processes
    #[derive(Default)]
    struct ScriptedRunner {
        completions: VecDeque<Completion>,
        launched: Vec<String>,
        refuse_launch: Option<usize>,
    }

    impl ScriptedRunner {
        fn new(completions: &[Completion]) -> Self {
            Self {
                completions: completions.iter().cloned().collect(),
                ..Default::default()
            }
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn launch(&mut self, invocation: &Invocation) -> Result<(), RunnerError> {
            if self.refuse_launch == Some(self.launched.len()) {
                return Err(RunnerError::Launch {
                    program: "atprogram".into(),
                    source: io::Error::new(io::ErrorKind::NotFound, "not found"),
                });
            }
            self.launched.push(invocation.label.clone());
            Ok(())
        }

        fn wait(&mut self, output: &mut dyn FnMut(&str)) -> Result<Completion, RunnerError> {
            output("Firmware check OK");
            Ok(self
                .completions
                .pop_front()
                .unwrap_or(Completion::Exited(0)))
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        done: usize,
    }

    impl SequenceProgress for Recorder {
        fn started(&mut self, index: usize, total: usize, invocation: &Invocation) {
            self.events
                .push(format!("start {}/{} {}", index, total, invocation.label));
        }

        fn output(&mut self, line: &str) {
            self.events.push(format!("out {}", line));
        }

        fn finished(&mut self, index: usize, completion: &Completion) {
            self.events.push(format!("end {} {}", index, completion));
        }

        fn done(&mut self, _outcome: &Outcome) {
            self.done += 1;
        }
    }

    fn plan_of(labels: &[&str]) -> CommandPlan {
        let mut plan = CommandPlan::new();
        for label in labels {
            plan.push(Invocation {
                label: label.to_string(),
                args: vec!["-v".into()],
            });
        }
        plan
    }

    #[test]
    fn test_runs_all_in_order() {
        let mut runner = ScriptedRunner::new(&[]);
        let mut progress = Recorder::default();
        let mut sequencer = Sequencer::new(&mut runner);

        let outcome = sequencer.run_to_completion(plan_of(&["a", "b", "c"]), &mut progress);

        assert_eq!(outcome, Some(Outcome::Succeeded { completed: 3 }));
        assert!(!sequencer.is_running());
        assert_eq!(runner.launched, ["a", "b", "c"]);
        assert_eq!(progress.done, 1);
        assert_eq!(
            &progress.events[..3],
            ["start 0/3 a", "out Firmware check OK", "end 0 exit code 0"]
        );
    }

    #[test]
    fn test_fail_fast() {
        let mut runner = ScriptedRunner::new(&[Completion::Exited(0), Completion::Exited(1)]);
        let mut progress = Recorder::default();
        let mut sequencer = Sequencer::new(&mut runner);

        let outcome = sequencer.run_to_completion(plan_of(&["a", "b", "c"]), &mut progress);

        assert_eq!(
            outcome,
            Some(Outcome::Failed {
                index: 1,
                label: "b".into(),
                completion: Completion::Exited(1),
                discarded: 1,
            })
        );
        assert_eq!(sequencer.pending(), 0);
        assert_eq!(runner.launched, ["a", "b"]);
        assert_eq!(progress.done, 1);
    }

    #[test]
    fn test_event_driven() {
        let mut sequencer = Sequencer::new(ScriptedRunner::new(&[]));
        let mut progress = NoProgress;

        assert_eq!(
            sequencer.start(plan_of(&["a", "b"]), &mut progress),
            StartOutcome::Started
        );
        assert_eq!(sequencer.state(), SequencerState::Running);
        assert_eq!(sequencer.pending(), 1);

        assert_eq!(sequencer.on_finished(Completion::Exited(0), &mut progress), None);
        assert_eq!(sequencer.runner().launched, ["a", "b"]);

        let outcome = sequencer.on_finished(Completion::Error("crashed".into()), &mut progress);
        assert_eq!(
            outcome,
            Some(Outcome::Failed {
                index: 1,
                label: "b".into(),
                completion: Completion::Error("crashed".into()),
                discarded: 0,
            })
        );
        assert_eq!(sequencer.state(), SequencerState::Idle);
    }

    #[test]
    fn test_start_while_running_rejected() {
        let mut sequencer = Sequencer::new(ScriptedRunner::new(&[]));
        let mut progress = NoProgress;

        sequencer.start(plan_of(&["a", "b"]), &mut progress);
        assert_eq!(
            sequencer.start(plan_of(&["x", "y", "z"]), &mut progress),
            StartOutcome::Rejected
        );
        assert_eq!(sequencer.pending(), 1);
        assert_eq!(sequencer.runner().launched, ["a"]);
    }

    #[test]
    fn test_empty_plan() {
        let mut sequencer = Sequencer::new(ScriptedRunner::new(&[]));
        let mut progress = Recorder::default();

        assert_eq!(
            sequencer.start(CommandPlan::new(), &mut progress),
            StartOutcome::NothingToDo
        );
        assert!(!sequencer.is_running());
        assert_eq!(progress.done, 0);
        assert_eq!(
            sequencer.run_to_completion(CommandPlan::new(), &mut progress),
            None
        );
    }

    #[test]
    fn test_launch_failure_is_failure() {
        let mut runner = ScriptedRunner::new(&[]);
        runner.refuse_launch = Some(1);
        let mut progress = Recorder::default();
        let mut sequencer = Sequencer::new(&mut runner);

        let outcome = sequencer
            .run_to_completion(plan_of(&["a", "b", "c"]), &mut progress)
            .unwrap();

        match outcome {
            Outcome::Failed {
                index,
                completion: Completion::Error(reason),
                discarded,
                ..
            } => {
                assert_eq!(index, 1);
                assert!(reason.contains("failed to launch atprogram"));
                assert_eq!(discarded, 1);
            }
            other => panic!("expected launch failure, got {:?}", other),
        }
        assert_eq!(runner.launched, ["a"]);
        assert_eq!(progress.done, 1);
    }

    #[test]
    fn test_first_launch_failure() {
        let mut runner = ScriptedRunner::new(&[]);
        runner.refuse_launch = Some(0);
        let mut sequencer = Sequencer::new(&mut runner);

        let started = sequencer.start(plan_of(&["a"]), &mut NoProgress);
        assert!(matches!(
            started,
            StartOutcome::Finished(Outcome::Failed { index: 0, .. })
        ));
        assert!(!sequencer.is_running());
    }

    #[test]
    fn test_reusable_after_outcome() {
        let mut sequencer = Sequencer::new(ScriptedRunner::new(&[Completion::Exited(3)]));
        let mut progress = NoProgress;

        let first = sequencer.run_to_completion(plan_of(&["a", "b"]), &mut progress);
        assert!(!first.unwrap().is_success());

        let second = sequencer.run_to_completion(plan_of(&["c"]), &mut progress);
        assert_eq!(second, Some(Outcome::Succeeded { completed: 1 }));
        assert_eq!(sequencer.runner().launched, ["a", "c"]);
    }

    #[test]
    fn test_completion_while_idle_ignored() {
        let mut sequencer = Sequencer::new(ScriptedRunner::new(&[]));
        assert_eq!(
            sequencer.on_finished(Completion::Exited(0), &mut NoProgress),
            None
        );
        assert!(sequencer.runner().launched.is_empty());
    }
}
