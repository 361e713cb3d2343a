//! Child process runner

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use atflash_core::error::RunnerError;
use atflash_core::sequence::{Completion, Invocation, ProcessRunner};

/// Tool path used when none is configured
pub const DEFAULT_PROGRAM: &str = if cfg!(windows) {
    "./atbackend/atprogram.exe"
} else {
    "atprogram"
};

/// How often `wait` wakes up to check the deadline
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output may stay quiet after exit before `wait` stops collecting
const DRAIN_QUIET: Duration = Duration::from_millis(250);

/// Runner configuration
#[derive(Debug, Clone)]
pub struct AtprogramConfig {
    /// Executable to run
    pub program: PathBuf,
    /// Kill invocations running longer than this (default: no limit)
    pub timeout: Option<Duration>,
}

impl Default for AtprogramConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            timeout: None,
        }
    }
}

impl AtprogramConfig {
    /// Create a configuration for the given executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Set the per-invocation timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct Running {
    child: Child,
    lines: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
    started: Instant,
}

/// Runs each invocation as an `atprogram` child process
pub struct AtprogramRunner {
    config: AtprogramConfig,
    running: Option<Running>,
}

impl AtprogramRunner {
    /// Create a runner; nothing is spawned until `launch`
    pub fn new(config: AtprogramConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// Executable this runner starts
    pub fn program(&self) -> &Path {
        &self.config.program
    }

    /// Whether a child process is alive
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

fn spawn_reader<T: Read + Send + 'static>(stream: T, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut forward = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("Output pipe closed: {}", e);
                    break;
                }
            }

            // The tool prints in the console code page, not necessarily UTF-8
            if forward {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(&['\r', '\n'][..]);
                // Keep reading after the receiver is gone so the child never
                // writes into a closed pipe
                forward = tx.send(line.to_string()).is_ok();
            }
        }
    })
}

/// Forward lines still queued after the child exited
///
/// Stops once the readers hang up or stay quiet for [`DRAIN_QUIET`], since a
/// background process may hold the pipes open indefinitely.
fn drain(lines: &Receiver<String>, output: &mut dyn FnMut(&str)) {
    while let Ok(line) = lines.recv_timeout(DRAIN_QUIET) {
        output(&line);
    }
}

impl ProcessRunner for AtprogramRunner {
    fn launch(&mut self, invocation: &Invocation) -> Result<(), RunnerError> {
        if self.running.is_some() {
            return Err(RunnerError::Busy);
        }

        log::info!("{}", invocation.command_line(&self.config.program));
        let mut child = Command::new(&self.config.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Launch {
                program: self.config.program.display().to_string(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, tx));
        }

        log::debug!("Spawned pid {}", child.id());
        self.running = Some(Running {
            child,
            lines: rx,
            readers,
            started: Instant::now(),
        });
        Ok(())
    }

    fn wait(&mut self, output: &mut dyn FnMut(&str)) -> Result<Completion, RunnerError> {
        let mut running = self.running.take().ok_or(RunnerError::NotRunning)?;
        let timeout = self.config.timeout;
        let deadline = timeout.map(|t| running.started + t);

        let status = loop {
            let poll = deadline.map_or(POLL_INTERVAL, |d| {
                d.saturating_duration_since(Instant::now()).min(POLL_INTERVAL)
            });
            match running.lines.recv_timeout(poll) {
                Ok(line) => output(&line),
                Err(RecvTimeoutError::Disconnected) => break running.child.wait()?,
                Err(RecvTimeoutError::Timeout) => {}
            }

            // Output pipes may outlive the child when it leaves a process behind
            if let Some(status) = running.child.try_wait()? {
                break status;
            }

            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if Instant::now() >= deadline {
                    log::warn!("Invocation exceeded {:?}, killing it", timeout);
                    let _ = running.child.kill();
                    let _ = running.child.wait();
                    return Err(RunnerError::TimedOut(timeout));
                }
            }
        };

        drain(&running.lines, output);
        for reader in running.readers {
            if reader.is_finished() {
                let _ = reader.join();
            } else {
                log::trace!("Leaving output reader attached to a background process");
            }
        }

        log::debug!("Child exited: {}", status);
        Ok(match status.code() {
            Some(code) => Completion::Exited(code),
            None => Completion::Error(format!("atprogram terminated abnormally ({})", status)),
        })
    }

    fn kill(&mut self) -> Result<(), RunnerError> {
        let running = self.running.as_mut().ok_or(RunnerError::NotRunning)?;
        match running.child.kill() {
            Ok(()) => Ok(()),
            // Already exited; wait() will collect it
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }
}

impl Drop for AtprogramRunner {
    fn drop(&mut self) {
        if let Some(mut running) = self.running.take() {
            let _ = running.child.kill();
            let _ = running.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atflash_core::sequence::{CommandPlan, NoProgress, Outcome, Sequencer};

    fn invocation(args: &[&str]) -> Invocation {
        Invocation {
            label: "test".into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_missing_program() {
        let mut runner = AtprogramRunner::new(AtprogramConfig::new("/nonexistent/atprogram"));
        let err = runner.launch(&invocation(&["-v"])).unwrap_err();
        assert!(matches!(err, RunnerError::Launch { .. }));
        assert!(!runner.is_running());
    }

    #[test]
    fn test_wait_without_launch() {
        let mut runner = AtprogramRunner::new(AtprogramConfig::default());
        let err = runner.wait(&mut |_| {}).unwrap_err();
        assert!(matches!(err, RunnerError::NotRunning));
        assert!(matches!(runner.kill(), Err(RunnerError::NotRunning)));
    }

    #[test]
    fn test_default_config() {
        let config = AtprogramConfig::default();
        assert_eq!(config.program, PathBuf::from(DEFAULT_PROGRAM));
        assert_eq!(config.timeout, None);
        assert_eq!(AtprogramRunner::new(config).timeout(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_and_output() {
        let mut runner = AtprogramRunner::new(AtprogramConfig::new("sh"));
        runner
            .launch(&invocation(&["-c", "echo hello; echo oops >&2; exit 3"]))
            .unwrap();
        assert!(matches!(
            runner.launch(&invocation(&["-c", "true"])),
            Err(RunnerError::Busy)
        ));

        let mut lines = Vec::new();
        let completion = runner.wait(&mut |l| lines.push(l.to_string())).unwrap();
        lines.sort();

        assert_eq!(completion, Completion::Exited(3));
        assert_eq!(lines, ["hello", "oops"]);
        assert!(!runner.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_output_keeps_child_alive() {
        let config = AtprogramConfig::new("sh").with_timeout(Duration::from_secs(10));
        let mut runner = AtprogramRunner::new(config);
        let script = "printf 'Temp 25\\260C\\n'; \
                      head -c 300000 /dev/zero | tr '\\0' 'a'; echo; exit 0";
        runner.launch(&invocation(&["-c", script])).unwrap();

        let mut lines = Vec::new();
        let completion = runner.wait(&mut |l| lines.push(l.to_string())).unwrap();

        assert_eq!(completion, Completion::Exited(0));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Temp 25\u{FFFD}C");
        assert_eq!(lines[1].len(), 300_000);
    }

    #[cfg(unix)]
    #[test]
    fn test_background_process_does_not_block_wait() {
        let config = AtprogramConfig::new("sh").with_timeout(Duration::from_secs(10));
        let mut runner = AtprogramRunner::new(config);
        runner
            .launch(&invocation(&["-c", "sleep 5 & echo started; exit 2"]))
            .unwrap();

        let started = Instant::now();
        let mut lines = Vec::new();
        let completion = runner.wait(&mut |l| lines.push(l.to_string())).unwrap();

        assert_eq!(completion, Completion::Exited(2));
        assert_eq!(lines, ["started"]);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills() {
        let config = AtprogramConfig::new("sh").with_timeout(Duration::from_millis(100));
        let mut runner = AtprogramRunner::new(config);
        runner.launch(&invocation(&["-c", "exec sleep 5"])).unwrap();

        let started = Instant::now();
        let err = runner.wait(&mut |_| {}).unwrap_err();
        assert!(matches!(err, RunnerError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_kill() {
        let mut runner = AtprogramRunner::new(AtprogramConfig::new("sh"));
        runner.launch(&invocation(&["-c", "exec sleep 5"])).unwrap();
        runner.kill().unwrap();
        let completion = runner.wait(&mut |_| {}).unwrap();
        assert!(matches!(completion, Completion::Error(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_sequenced_failure() {
        let mut plan = CommandPlan::new();
        plan.push(invocation(&["-c", "exit 0"]));
        plan.push(invocation(&["-c", "exit 1"]));
        plan.push(invocation(&["-c", "exit 0"]));

        let mut runner = AtprogramRunner::new(AtprogramConfig::new("sh"));
        let outcome = Sequencer::new(&mut runner).run_to_completion(plan, &mut NoProgress);

        assert!(matches!(
            outcome,
            Some(Outcome::Failed {
                index: 1,
                discarded: 1,
                ..
            })
        ));
    }
}
