//! Attempt validation: structure first, then the procedure in a sandbox.

use std::time::Duration;

use tracing::{info, warn};

use crate::core::draft::Draft;
use crate::core::outcome::ValidationOutcome;
use crate::sandbox::SandboxExecutor;

#[derive(Clone)]
pub struct AttemptValidator {
    executor: SandboxExecutor,
    per_command: Duration,
    total: Duration,
}

impl AttemptValidator {
    #[must_use]
    pub fn new(executor: SandboxExecutor, per_command: Duration, total: Duration) -> Self {
        Self {
            executor,
            per_command,
            total,
        }
    }

    /// Verdict for one draft.
    ///
    /// A structurally invalid draft fails without touching the sandbox. A
    /// procedure with no commands passes without provisioning one.
    #[must_use]
    pub fn validate(&self, draft: &Draft) -> ValidationOutcome {
        let report = draft.check();
        if !report.is_valid() {
            warn!(skill = %draft.name, errors = report.errors.len(), "draft failed structural checks");
            return ValidationOutcome::structural(report.errors);
        }

        let commands = match draft.procedure() {
            Ok(procedure) => procedure.commands(),
            Err(err) => return ValidationOutcome::structural(vec![err.to_string()]),
        };
        if commands.is_empty() {
            info!(skill = %draft.name, "procedure has no executable commands");
            return ValidationOutcome::passed(Vec::new(), 0);
        }

        info!(
            skill = %draft.name,
            commands = commands.len(),
            backend = self.executor.backend_name(),
            "validating procedure"
        );
        self.executor.execute(&commands, self.per_command, self.total)
    }
}
