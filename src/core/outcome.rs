//! Per-command results and the verdict of one validation attempt.

use serde::{Deserialize, Serialize};

/// Bytes of captured output kept when summarizing a failure.
const SUMMARY_TAIL: usize = 800;

/// One executed step's exit status, captured output and elapsed time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Position in the command sequence (0-based).
    pub index: usize,
    pub command: String,
    /// `None` when the process was killed or never produced a status.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub timed_out: bool,
}

impl CommandResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// stdout and stderr joined, stderr last.
    #[must_use]
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", "") => String::new(),
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutScope {
    /// The single-command ceiling was hit.
    Command,
    /// The whole-sequence ceiling was hit.
    Session,
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Frontmatter or section layout is invalid; nothing was executed.
    Structural { errors: Vec<String> },
    /// A command exited non-zero.
    CommandFailed { exit_code: Option<i32> },
    /// A command exceeded a time ceiling.
    Timeout { scope: TimeoutScope },
    /// The sandbox could not be created.
    Provision { message: String },
    /// The sandbox broke while running a command.
    Backend { message: String },
}

/// Pass/fail verdict plus the ordered results of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// Index of the first failing command, if a command failed.
    pub failing_step: Option<usize>,
    pub results: Vec<CommandResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub duration_ms: u64,
}

impl ValidationOutcome {
    #[must_use]
    pub fn passed(results: Vec<CommandResult>, duration_ms: u64) -> Self {
        Self {
            passed: true,
            failing_step: None,
            results,
            failure: None,
            duration_ms,
        }
    }

    #[must_use]
    pub fn failed(
        results: Vec<CommandResult>,
        failing_step: Option<usize>,
        failure: FailureKind,
        duration_ms: u64,
    ) -> Self {
        Self {
            passed: false,
            failing_step,
            results,
            failure: Some(failure),
            duration_ms,
        }
    }

    /// Failure before any command ran.
    #[must_use]
    pub fn structural(errors: Vec<String>) -> Self {
        Self::failed(Vec::new(), None, FailureKind::Structural { errors }, 0)
    }

    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self.failure, Some(FailureKind::Structural { .. }))
    }

    #[must_use]
    pub fn failing_result(&self) -> Option<&CommandResult> {
        self.failing_step.and_then(|idx| self.results.get(idx))
    }

    /// One-paragraph description for logs, events and refinement prompts.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.passed {
            return format!("all {} commands passed", self.results.len());
        }
        match &self.failure {
            Some(FailureKind::Structural { errors }) => {
                format!("structural validation failed: {}", errors.join("; "))
            }
            Some(FailureKind::Provision { message }) => {
                format!("sandbox could not be provisioned: {message}")
            }
            Some(failure) => {
                let Some(result) = self.failing_result() else {
                    return format!("validation failed: {failure:?}");
                };
                let reason = match failure {
                    FailureKind::Timeout {
                        scope: TimeoutScope::Command,
                    } => "timed out".to_string(),
                    FailureKind::Timeout {
                        scope: TimeoutScope::Session,
                    } => "hit the session time limit".to_string(),
                    FailureKind::Backend { message } => format!("sandbox error: {message}"),
                    _ => match result.exit_code {
                        Some(code) => format!("exited with code {code}"),
                        None => "was terminated".to_string(),
                    },
                };
                let combined = result.combined_output();
                let output = tail(&combined, SUMMARY_TAIL);
                if output.is_empty() {
                    format!("command {} `{}` {reason}", result.index + 1, result.command)
                } else {
                    format!(
                        "command {} `{}` {reason}\n{output}",
                        result.index + 1,
                        result.command
                    )
                }
            }
            None => "validation failed".to_string(),
        }
    }
}

/// Last `max` bytes of `text`, cut on a char boundary.
#[must_use]
pub fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
