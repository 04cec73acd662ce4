//! skill-forge learn-all - learn every configured topic concurrently

use std::process::ExitCode;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::commands::learn::RunReport;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok, spinner};
use crate::core::run::RunStatus;
use crate::error::{ForgeError, Result};

#[derive(Args, Debug)]
pub struct LearnAllArgs {
    /// Topics to learn instead of `pipeline.topics` (repeatable)
    #[arg(long = "topic", value_name = "TOPIC")]
    pub topics: Vec<String>,

    /// Concurrent runs (default: `pipeline.concurrency`)
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BatchReport {
    validated: usize,
    unvalidated: usize,
    aborted: usize,
    runs: Vec<RunReport>,
}

pub fn run(ctx: &AppContext, args: &LearnAllArgs) -> Result<ExitCode> {
    let topics: Vec<String> = if args.topics.is_empty() {
        ctx.config.pipeline.topics.clone()
    } else {
        args.topics.clone()
    };
    let topics: Vec<String> = topics
        .into_iter()
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty())
        .collect();
    if topics.is_empty() {
        return Err(ForgeError::MissingConfig(
            "no topics: set pipeline.topics or pass --topic".to_string(),
        ));
    }

    let concurrency = args.concurrency.unwrap_or(ctx.config.pipeline.concurrency);
    let pipeline = ctx.pipeline()?;
    let progress = (!ctx.robot_mode)
        .then(|| spinner(format!("Learning {} topics ({concurrency} at a time)", topics.len())));
    let runs = pipeline.run_many(&topics, concurrency)?;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    let runs: Vec<RunReport> = runs.iter().map(RunReport::from_run).collect();
    let count = |status: RunStatus| runs.iter().filter(|r| r.status == status).count();
    let report = BatchReport {
        validated: count(RunStatus::Validated),
        unvalidated: count(RunStatus::SavedUnvalidated),
        aborted: count(RunStatus::Aborted),
        runs,
    };

    if ctx.robot_mode {
        emit_json(&robot_ok(&report))?;
    } else {
        let mut layout = HumanLayout::new();
        layout.title("Skill Forge - batch");
        for run in &report.runs {
            layout.section(&run.topic);
            run.write_human(&mut layout);
            layout.blank();
        }
        layout
            .kv("Validated", &report.validated.to_string())
            .kv("Unvalidated", &report.unvalidated.to_string())
            .kv("Aborted", &report.aborted.to_string());
        emit_human(layout);
    }

    Ok(if report.aborted > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
