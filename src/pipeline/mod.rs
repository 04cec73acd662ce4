//! Research, draft, validate, refine, save.
//!
//! [`Pipeline::run`] drives one topic to a terminal status. Each loop turn
//! asks [`state::next_stage`] what to do next, performs exactly that stage,
//! and records one or more events. Collaborator failures never escape: they
//! abort the run and callers inspect [`PipelineRun::status`].

pub mod state;

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::event::{Event, EventKind};
use crate::core::record::SkillRecord;
use crate::core::run::{PipelineRun, RunStatus};
use crate::error::{ForgeError, Result};
use crate::events::{EventRecorder, EventSink};
use crate::generator::DraftGenerator;
use crate::notify::Notifier;
use crate::publish::Publisher;
use crate::refiner::DraftRefiner;
use crate::research::ResearchProvider;
use crate::sandbox::{SandboxBackend, SandboxExecutor};
use crate::storage::{SkillDirWriter, SkillStore};
use crate::validator::AttemptValidator;

pub use state::{Stage, next_stage};

/// Everything a pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub research: Arc<dyn ResearchProvider>,
    pub generator: Arc<dyn DraftGenerator>,
    pub sandbox: Arc<dyn SandboxBackend>,
    pub events: Arc<dyn EventSink>,
    pub store: Arc<dyn SkillStore>,
    pub notifier: Option<Arc<dyn Notifier>>,
    /// Optional on-disk SKILL.md mirror of saved records.
    pub skill_dir: Option<SkillDirWriter>,
    /// Optional remote copy of saved records.
    pub publisher: Option<Arc<dyn Publisher>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_attempts: usize,
    pub per_command_timeout: Duration,
    pub total_timeout: Duration,
    pub dashboard_url: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_command_timeout: Duration::from_secs(120),
            total_timeout: Duration::from_secs(300),
            dashboard_url: None,
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.pipeline.max_attempts,
            per_command_timeout: config.sandbox.per_command_timeout,
            total_timeout: config.sandbox.total_timeout,
            dashboard_url: config.notify.dashboard_url.clone(),
        }
    }
}

pub struct Pipeline {
    research: Arc<dyn ResearchProvider>,
    store: Arc<dyn SkillStore>,
    skill_dir: Option<SkillDirWriter>,
    publisher: Option<Arc<dyn Publisher>>,
    recorder: EventRecorder,
    refiner: DraftRefiner,
    validator: AttemptValidator,
    max_attempts: usize,
}

impl Pipeline {
    #[must_use]
    pub fn new(collaborators: Collaborators, options: &PipelineOptions) -> Self {
        let max_attempts = options.max_attempts.max(1);
        let mut recorder = EventRecorder::new(collaborators.events)
            .with_dashboard_url(options.dashboard_url.clone());
        if let Some(notifier) = collaborators.notifier {
            recorder = recorder.with_notifier(notifier);
        }
        let validator = AttemptValidator::new(
            SandboxExecutor::new(collaborators.sandbox),
            options.per_command_timeout,
            options.total_timeout,
        );

        Self {
            research: collaborators.research,
            store: collaborators.store,
            skill_dir: collaborators.skill_dir,
            publisher: collaborators.publisher,
            recorder,
            refiner: DraftRefiner::new(collaborators.generator, max_attempts),
            validator,
            max_attempts,
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Drive `topic` to a terminal status.
    #[must_use]
    pub fn run(&self, topic: &str) -> PipelineRun {
        let mut run = PipelineRun::new(topic.trim());
        info!(run_id = %run.id, topic = %run.topic, "pipeline started");

        loop {
            match next_stage(&run, self.max_attempts) {
                Stage::Idle | Stage::Researching => self.research_stage(&mut run),
                Stage::Drafting | Stage::Refining => self.draft_stage(&mut run),
                Stage::Validating => self.validate_stage(&mut run),
                Stage::Terminal(status) => {
                    if !run.status.is_terminal() {
                        self.conclude(&mut run, status);
                    }
                    break;
                }
            }
        }

        info!(
            run_id = %run.id,
            topic = %run.topic,
            status = %run.status,
            attempts = run.attempts_used(),
            "pipeline finished"
        );
        run
    }

    /// Run every topic on a pool of `concurrency` threads.
    ///
    /// Results come back in input order.
    pub fn run_many(&self, topics: &[String], concurrency: usize) -> Result<Vec<PipelineRun>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|index| format!("skill-forge-run-{index}"))
            .build()
            .map_err(|err| ForgeError::Config(format!("failed to build run pool: {err}")))?;
        Ok(pool.install(|| topics.par_iter().map(|topic| self.run(topic)).collect()))
    }

    fn research_stage(&self, run: &mut PipelineRun) {
        self.recorder.record(Event::new(
            EventKind::ResearchStart,
            &run.topic,
            format!("Researching {}", run.topic),
        ));

        match self.research.research(&run.topic) {
            Ok(bundle) if bundle.is_empty() => {
                let reason = format!("No sources found for {}", run.topic);
                run.research = Some(bundle);
                self.abort(run, reason);
            }
            Ok(bundle) => {
                let count = bundle.count();
                info!(topic = %run.topic, sources = count, "research complete");
                self.recorder.record(
                    Event::new(
                        EventKind::ResearchDone,
                        &run.topic,
                        format!("Collected {count} sources"),
                    )
                    .with_meta("sources_count", count),
                );
                run.research = Some(bundle);
            }
            Err(err) => {
                let reason = format!("Research failed for {}: {err}", run.topic);
                self.abort(run, reason);
            }
        }
    }

    fn draft_stage(&self, run: &mut PipelineRun) {
        let attempt = run.attempts_used() + 1;
        let Some(bundle) = run.research.as_ref() else {
            self.abort(run, "Drafting requested before research".to_string());
            return;
        };
        let prior_failures = run.attempts().iter().filter(|a| !a.passed()).count();
        let message = if attempt > 1 {
            format!("Refining draft for {} (attempt {attempt})", run.topic)
        } else {
            format!("Drafting skill for {}", run.topic)
        };
        self.recorder.record(
            Event::new(EventKind::Drafting, &run.topic, message)
                .with_meta("attempt", attempt)
                .with_meta("max_attempts", self.max_attempts)
                .with_meta("refining", attempt > 1)
                .with_meta("prior_failures", prior_failures),
        );

        match self.refiner.refine(&run.topic, bundle, run.attempts()) {
            Ok(draft) => {
                info!(topic = %run.topic, skill = %draft.name, attempt, "draft ready");
                run.pending_draft = Some(draft);
            }
            Err(err) => self.abort(run, format!("Draft generation failed: {err}")),
        }
    }

    fn validate_stage(&self, run: &mut PipelineRun) {
        let Some(draft) = run.pending_draft.take() else {
            return;
        };
        let attempt = run.attempts_used() + 1;
        self.recorder.record(
            Event::new(
                EventKind::Validating,
                &run.topic,
                format!("Validating {} (attempt {attempt})", draft.name),
            )
            .with_skill(&draft.name)
            .with_meta("attempt", attempt),
        );

        let outcome = self.validator.validate(&draft);
        let event = if outcome.passed {
            info!(skill = %draft.name, attempt, "validation passed");
            Event::new(
                EventKind::ValidatedOk,
                &run.topic,
                format!("{} passed validation", draft.name),
            )
            .with_meta("description", draft.description.clone())
        } else {
            warn!(skill = %draft.name, attempt, "validation failed");
            let mut event = Event::new(EventKind::ValidatedFail, &run.topic, outcome.summary())
                .with_meta("details", outcome.summary());
            if let Some(step) = outcome.failing_step {
                event = event.with_meta("failing_step", step);
            }
            event
        };
        self.recorder.record(
            event
                .with_skill(&draft.name)
                .with_meta("attempt", attempt)
                .with_meta("max_attempts", self.max_attempts)
                .with_meta("steps_tested", outcome.results.len()),
        );

        run.push_attempt(draft, outcome);
    }

    /// Persist the last attempt and close the run.
    fn conclude(&self, run: &mut PipelineRun, status: RunStatus) {
        if status == RunStatus::Aborted {
            let reason = format!("No sources found for {}", run.topic);
            self.abort(run, reason);
            return;
        }
        let Some(last) = run.last_attempt() else {
            self.abort(run, "Run ended without an attempt".to_string());
            return;
        };

        let mut record = SkillRecord::from_draft(
            &last.draft,
            last.passed(),
            run.sources_count(),
            run.attempts_used(),
        );
        record.topic.clone_from(&run.topic);

        match self.store.put(&record) {
            Ok(()) => {
                self.write_skill_file(&record);
                run.record_id = Some(record.id.clone());
                run.published_url = self.publish(&record);
                let mut event = Event::new(
                    EventKind::Saved,
                    &run.topic,
                    format!("Saved {} ({status})", record.name),
                )
                .with_skill(&record.name)
                .with_meta("record_id", record.id.as_str())
                .with_meta("validation_passed", record.validation_passed)
                .with_meta("attempts", record.attempts)
                .with_meta("status", status.as_str());
                if let Some(url) = &run.published_url {
                    event = event.with_meta("github_url", url.as_str());
                }
                self.recorder.record(event);
            }
            Err(err) => {
                error!(skill = %record.name, error = %err, "failed to persist skill record");
                self.recorder.record(
                    Event::new(
                        EventKind::Error,
                        &run.topic,
                        format!("Failed to save {}: {err}", record.name),
                    )
                    .with_skill(&record.name),
                );
                run.persist_error = Some(err.to_string());
            }
        }

        run.finish(status);
    }

    fn write_skill_file(&self, record: &SkillRecord) {
        let Some(writer) = &self.skill_dir else {
            return;
        };
        if let Err(err) = writer.write(record) {
            warn!(skill = %record.name, error = %err, "failed to write SKILL.md");
        }
    }

    /// Publish failures are logged; the record stays saved locally.
    fn publish(&self, record: &SkillRecord) -> Option<String> {
        let publisher = self.publisher.as_ref()?;
        match publisher.publish(record) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(skill = %record.name, error = %err, "failed to publish skill");
                None
            }
        }
    }

    fn abort(&self, run: &mut PipelineRun, reason: String) {
        error!(topic = %run.topic, reason = %reason, "run aborted");
        self.recorder
            .record(Event::new(EventKind::Error, &run.topic, reason.clone()));
        run.abort(reason);
    }
}
