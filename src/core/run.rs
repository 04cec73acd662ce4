//! Pipeline runs and their attempt history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bundle::ResearchBundle;
use super::draft::Draft;
use super::outcome::ValidationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "validated")]
    Validated,
    #[serde(rename = "unvalidated-saved")]
    SavedUnvalidated,
    #[serde(rename = "aborted")]
    Aborted,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Validated => "validated",
            Self::SavedUnvalidated => "unvalidated-saved",
            Self::Aborted => "aborted",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One draft-and-validate cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based.
    pub number: usize,
    pub draft: Draft,
    pub outcome: ValidationOutcome,
    pub started_at: DateTime<Utc>,
}

impl Attempt {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome.passed
    }
}

/// End-to-end processing of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub topic: String,
    pub research: Option<ResearchBundle>,
    attempts: Vec<Attempt>,
    pub status: RunStatus,
    /// Last attempt's draft, set once the run terminates.
    pub final_draft: Option<Draft>,
    pub abort_reason: Option<String>,
    /// Draft produced but not yet validated.
    #[serde(skip)]
    pub pending_draft: Option<Draft>,
    /// Id of the persisted record, when the store accepted it.
    pub record_id: Option<String>,
    /// Why the store rejected the final record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
    /// Public URL of the published SKILL.md.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            research: None,
            attempts: Vec::new(),
            status: RunStatus::Running,
            final_draft: None,
            abort_reason: None,
            pending_draft: None,
            record_id: None,
            persist_error: None,
            published_url: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    #[must_use]
    pub fn attempts_used(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    #[must_use]
    pub fn sources_count(&self) -> usize {
        self.research.as_ref().map_or(0, ResearchBundle::count)
    }

    /// Outcome of the last attempt; false when nothing was validated.
    #[must_use]
    pub fn validation_passed(&self) -> bool {
        self.last_attempt().is_some_and(Attempt::passed)
    }

    /// Append the next attempt. Numbers are assigned in order.
    pub fn push_attempt(&mut self, draft: Draft, outcome: ValidationOutcome) -> &Attempt {
        let number = self.attempts.len() + 1;
        self.attempts.push(Attempt {
            number,
            draft,
            outcome,
            started_at: Utc::now(),
        });
        &self.attempts[number - 1]
    }

    pub fn abort(&mut self, reason: impl Into<String>) {
        self.abort_reason = Some(reason.into());
        self.finish(RunStatus::Aborted);
    }

    /// Move to a terminal status and pin the final draft.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.final_draft = self.last_attempt().map(|attempt| attempt.draft.clone());
        self.finished_at = Some(Utc::now());
    }
}
