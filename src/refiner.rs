//! Turns attempt history into the next generation request.

use std::sync::Arc;

use tracing::debug;

use crate::core::bundle::ResearchBundle;
use crate::core::draft::Draft;
use crate::core::outcome::{FailureKind, tail};
use crate::core::run::Attempt;
use crate::error::Result;
use crate::generator::{DraftGenerator, FailureContext, GenerationRequest};

/// Captured output kept per failure in a refinement request.
pub const OUTPUT_TAIL: usize = 800;

pub struct DraftRefiner {
    generator: Arc<dyn DraftGenerator>,
    max_attempts: usize,
}

impl DraftRefiner {
    #[must_use]
    pub fn new(generator: Arc<dyn DraftGenerator>, max_attempts: usize) -> Self {
        Self {
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draft the next attempt. Generator errors propagate unchanged.
    pub fn refine(&self, topic: &str, bundle: &ResearchBundle, history: &[Attempt]) -> Result<Draft> {
        let request = self.request(topic, bundle, history);
        debug!(
            topic,
            attempt = request.attempt,
            prior_failures = request.prior_failures.len(),
            "requesting draft"
        );
        self.generator.generate(&request)
    }

    /// Request carrying the most recent `max_attempts` failures.
    #[must_use]
    pub fn request(&self, topic: &str, bundle: &ResearchBundle, history: &[Attempt]) -> GenerationRequest {
        let failed: Vec<&Attempt> = history.iter().filter(|a| !a.passed()).collect();
        let skip = failed.len().saturating_sub(self.max_attempts);
        let prior_failures = failed.into_iter().skip(skip).map(failure_context).collect();

        GenerationRequest {
            topic: topic.to_string(),
            bundle: bundle.clone(),
            prior_failures,
            attempt: history.len() + 1,
            max_attempts: self.max_attempts,
        }
    }
}

/// Failure context for one failed attempt.
#[must_use]
pub fn failure_context(attempt: &Attempt) -> FailureContext {
    let outcome = &attempt.outcome;
    let failing = outcome.failing_result();
    let step_number = outcome.failing_step.and_then(|index| {
        attempt
            .draft
            .procedure()
            .ok()
            .and_then(|procedure| procedure.step_for_command(index))
    });
    let output = match (&outcome.failure, failing) {
        (Some(FailureKind::Structural { errors }), _) => errors.join("\n"),
        (_, Some(result)) => tail(&result.combined_output(), OUTPUT_TAIL).to_string(),
        _ => String::new(),
    };

    FailureContext {
        attempt: attempt.number,
        failing_step: outcome.failing_step,
        step_number,
        command: failing.map(|result| result.command.clone()),
        output,
        summary: outcome
            .summary()
            .lines()
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}
