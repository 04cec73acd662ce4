//! Stage transitions for one run.

use serde::{Deserialize, Serialize};

use crate::core::run::{PipelineRun, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "status")]
pub enum Stage {
    Idle,
    Researching,
    Drafting,
    Validating,
    Refining,
    Terminal(RunStatus),
}

impl Stage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// The stage a run moves to next, decided from its recorded state alone.
#[must_use]
pub fn next_stage(run: &PipelineRun, max_attempts: usize) -> Stage {
    if run.status.is_terminal() {
        return Stage::Terminal(run.status);
    }
    let Some(bundle) = &run.research else {
        return Stage::Researching;
    };
    if bundle.is_empty() {
        return Stage::Terminal(RunStatus::Aborted);
    }
    if run.pending_draft.is_some() {
        return Stage::Validating;
    }
    match run.last_attempt() {
        None => Stage::Drafting,
        Some(attempt) if attempt.passed() => Stage::Terminal(RunStatus::Validated),
        Some(_) if run.attempts_used() >= max_attempts => {
            Stage::Terminal(RunStatus::SavedUnvalidated)
        }
        Some(_) => Stage::Refining,
    }
}
