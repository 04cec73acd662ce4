//! skill-forge learn - run the pipeline for one topic

use std::process::ExitCode;

use clap::Args;
use console::style;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok, spinner};
use crate::core::run::{PipelineRun, RunStatus};
use crate::error::{ForgeError, Result};

#[derive(Args, Debug)]
pub struct LearnArgs {
    /// Topic to research, e.g. "docker networking"
    pub topic: String,
}

/// What a finished run reports on the command line.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub topic: String,
    pub status: RunStatus,
    pub skill_name: Option<String>,
    pub attempts: usize,
    pub sources_count: usize,
    pub validation_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_url: Option<String>,
    /// One summary per failed attempt, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn from_run(run: &PipelineRun) -> Self {
        Self {
            run_id: run.id.clone(),
            topic: run.topic.clone(),
            status: run.status,
            skill_name: run.final_draft.as_ref().map(|draft| draft.name.clone()),
            attempts: run.attempts_used(),
            sources_count: run.sources_count(),
            validation_passed: run.validation_passed(),
            record_id: run.record_id.clone(),
            abort_reason: run.abort_reason.clone(),
            persist_error: run.persist_error.clone(),
            published_url: run.published_url.clone(),
            failures: run
                .attempts()
                .iter()
                .filter(|attempt| !attempt.passed())
                .map(|attempt| format!("attempt {}: {}", attempt.number, attempt.outcome.summary()))
                .collect(),
        }
    }

    /// Aborted runs exit non-zero.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.status == RunStatus::Aborted {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }

    #[must_use]
    pub fn styled_status(&self) -> String {
        match self.status {
            RunStatus::Validated => style(self.status.as_str()).green().to_string(),
            RunStatus::SavedUnvalidated => style(self.status.as_str()).yellow().to_string(),
            RunStatus::Aborted => style(self.status.as_str()).red().to_string(),
            RunStatus::Running => self.status.as_str().to_string(),
        }
    }

    pub fn write_human(&self, layout: &mut HumanLayout) {
        layout
            .kv("Topic", &self.topic)
            .kv("Status", &self.styled_status())
            .kv("Skill", self.skill_name.as_deref().unwrap_or("-"))
            .kv("Attempts", &self.attempts.to_string())
            .kv("Sources", &self.sources_count.to_string());
        if let Some(id) = &self.record_id {
            layout.kv("Record", id);
        }
        if let Some(reason) = &self.abort_reason {
            layout.kv("Aborted", reason);
        }
        if let Some(err) = &self.persist_error {
            layout.kv("Not saved", err);
        }
        if let Some(url) = &self.published_url {
            layout.kv("Published", url);
        }
        for failure in &self.failures {
            let first_line = failure.lines().next().unwrap_or_default();
            layout.bullet(first_line);
        }
    }
}

pub fn run(ctx: &AppContext, args: &LearnArgs) -> Result<ExitCode> {
    let topic = args.topic.trim();
    if topic.is_empty() {
        return Err(ForgeError::Config("topic must not be empty".to_string()));
    }

    let pipeline = ctx.pipeline()?;
    let progress = (!ctx.robot_mode).then(|| spinner(format!("Learning {topic}")));
    let run = pipeline.run(topic);
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    let report = RunReport::from_run(&run);
    if ctx.robot_mode {
        emit_json(&robot_ok(&report))?;
    } else {
        let mut layout = HumanLayout::new();
        layout.title("Skill Forge");
        report.write_human(&mut layout);
        emit_human(layout);
    }
    Ok(report.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::draft::Draft;
    use crate::core::outcome::ValidationOutcome;

    #[test]
    fn report_lists_failed_attempts() {
        let mut run = PipelineRun::new("docker");
        let draft = Draft::from_markdown("docker", "");
        run.push_attempt(draft.clone(), ValidationOutcome::structural(vec!["no frontmatter".into()]));
        run.push_attempt(draft, ValidationOutcome::passed(Vec::new(), 3));
        run.finish(RunStatus::Validated);

        let report = RunReport::from_run(&run);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("attempt 1: structural validation failed"));
        assert_eq!(report.skill_name.as_deref(), Some("docker"));
        assert_eq!(report.status, RunStatus::Validated);
    }

    #[test]
    fn aborted_run_exits_non_zero() {
        let mut run = PipelineRun::new("docker");
        run.abort("no sources");
        let report = RunReport::from_run(&run);
        assert_eq!(format!("{:?}", report.exit_code()), format!("{:?}", ExitCode::FAILURE));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["abort_reason"], "no sources");
    }
}
