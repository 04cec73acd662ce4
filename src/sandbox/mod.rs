//! Disposable execution environments for generated commands.
//!
//! [`SandboxExecutor`] provisions one fresh [`Sandbox`] per call, runs the
//! command sequence fail-fast, and tears the sandbox down exactly once on
//! every exit path through [`SandboxGuard`].

pub mod docker;
pub mod process;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::core::outcome::{CommandResult, FailureKind, TimeoutScope, ValidationOutcome};
use crate::error::Result;

pub use docker::DockerBackend;
pub use process::ProcessBackend;

/// What a sandbox observed while running one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl RawOutput {
    /// Convenience constructor for a completed command.
    #[must_use]
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
            duration: Duration::ZERO,
        }
    }

    fn into_result(self, index: usize, command: &str) -> CommandResult {
        CommandResult {
            index,
            command: command.to_string(),
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
            duration_ms: duration_ms(self.duration),
            timed_out: self.timed_out,
        }
    }
}

/// A live isolated environment.
pub trait Sandbox: Send {
    fn id(&self) -> &str;

    /// Run one command, killing it once `timeout` elapses.
    ///
    /// A timeout is reported through [`RawOutput::timed_out`], not as an error.
    fn run(&mut self, command: &str, timeout: Duration) -> Result<RawOutput>;

    /// Release every resource held by the sandbox.
    fn teardown(&mut self) -> Result<()>;
}

/// Factory for fresh sandboxes.
pub trait SandboxBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn provision(&self) -> Result<Box<dyn Sandbox>>;
}

/// Owns a sandbox and tears it down when dropped.
pub struct SandboxGuard {
    sandbox: Option<Box<dyn Sandbox>>,
}

impl SandboxGuard {
    #[must_use]
    pub fn new(sandbox: Box<dyn Sandbox>) -> Self {
        Self {
            sandbox: Some(sandbox),
        }
    }

    pub fn run(&mut self, command: &str, timeout: Duration) -> Result<RawOutput> {
        match self.sandbox.as_mut() {
            Some(sandbox) => sandbox.run(command, timeout),
            None => Err(crate::error::ForgeError::Sandbox(
                "sandbox already torn down".to_string(),
            )),
        }
    }

    /// Tear down now instead of at drop.
    pub fn release(&mut self) {
        if let Some(mut sandbox) = self.sandbox.take() {
            match sandbox.teardown() {
                Ok(()) => debug!(sandbox = sandbox.id(), "sandbox torn down"),
                Err(err) => warn!(sandbox = sandbox.id(), error = %err, "sandbox teardown failed"),
            }
        }
    }
}

impl Drop for SandboxGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs command sequences in fresh sandboxes from one backend.
#[derive(Clone)]
pub struct SandboxExecutor {
    backend: Arc<dyn SandboxBackend>,
}

impl SandboxExecutor {
    #[must_use]
    pub fn new(backend: Arc<dyn SandboxBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run `commands` in order, stopping at the first failure.
    ///
    /// Each command gets `min(per_command, time left of total)`. Never fails:
    /// provisioning and backend errors become failed outcomes.
    #[must_use]
    pub fn execute(
        &self,
        commands: &[String],
        per_command: Duration,
        total: Duration,
    ) -> ValidationOutcome {
        let started = Instant::now();

        let sandbox = match self.backend.provision() {
            Ok(sandbox) => sandbox,
            Err(err) => {
                warn!(backend = self.backend.name(), error = %err, "sandbox provisioning failed");
                return ValidationOutcome::failed(
                    Vec::new(),
                    None,
                    FailureKind::Provision {
                        message: err.to_string(),
                    },
                    duration_ms(started.elapsed()),
                );
            }
        };
        info!(
            backend = self.backend.name(),
            sandbox = sandbox.id(),
            commands = commands.len(),
            "sandbox provisioned"
        );
        let mut guard = SandboxGuard::new(sandbox);
        let mut results = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            let remaining = total.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                results.push(CommandResult {
                    index,
                    command: command.clone(),
                    exit_code: None,
                    stdout: String::new(),
                    stderr: "session time limit reached before the command started".to_string(),
                    duration_ms: 0,
                    timed_out: true,
                });
                return Self::fail(
                    guard,
                    results,
                    index,
                    FailureKind::Timeout {
                        scope: TimeoutScope::Session,
                    },
                    started,
                );
            }
            let (timeout, scope) = if per_command <= remaining {
                (per_command, TimeoutScope::Command)
            } else {
                (remaining, TimeoutScope::Session)
            };

            debug!(index, command = %command, ?timeout, "running command");
            match guard.run(command, timeout) {
                Ok(raw) => {
                    let result = raw.into_result(index, command);
                    debug!(
                        index,
                        exit_code = ?result.exit_code,
                        timed_out = result.timed_out,
                        duration_ms = result.duration_ms,
                        "command finished"
                    );
                    let failure = if result.timed_out {
                        Some(FailureKind::Timeout { scope })
                    } else if result.exit_code == Some(0) {
                        None
                    } else {
                        Some(FailureKind::CommandFailed {
                            exit_code: result.exit_code,
                        })
                    };
                    results.push(result);
                    if let Some(failure) = failure {
                        return Self::fail(guard, results, index, failure, started);
                    }
                }
                Err(err) => {
                    warn!(index, error = %err, "sandbox failed while running command");
                    results.push(CommandResult {
                        index,
                        command: command.clone(),
                        exit_code: None,
                        stdout: String::new(),
                        stderr: err.to_string(),
                        duration_ms: 0,
                        timed_out: false,
                    });
                    return Self::fail(
                        guard,
                        results,
                        index,
                        FailureKind::Backend {
                            message: err.to_string(),
                        },
                        started,
                    );
                }
            }
        }

        drop(guard);
        ValidationOutcome::passed(results, duration_ms(started.elapsed()))
    }

    fn fail(
        guard: SandboxGuard,
        results: Vec<CommandResult>,
        index: usize,
        failure: FailureKind,
        started: Instant,
    ) -> ValidationOutcome {
        drop(guard);
        ValidationOutcome::failed(results, Some(index), failure, duration_ms(started.elapsed()))
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
