//! skill-forge validate - run a SKILL.md procedure in the sandbox

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use console::style;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok, spinner};
use crate::config::SandboxBackendKind;
use crate::core::draft::Draft;
use crate::error::Result;
use crate::sandbox::process::ProcessBackend;
use crate::sandbox::{SandboxBackend, SandboxExecutor};
use crate::sandbox::docker::DockerBackend;
use crate::validator::AttemptValidator;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to a SKILL.md file
    pub file: PathBuf,

    /// Sandbox backend (default: `sandbox.backend`)
    #[arg(long, value_enum)]
    pub backend: Option<SandboxBackendKind>,
}

pub fn run(ctx: &AppContext, args: &ValidateArgs) -> Result<ExitCode> {
    let content = std::fs::read_to_string(&args.file)?;
    let topic = args
        .file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("skill");
    let draft = Draft::from_markdown(topic, &content);

    let backend: Arc<dyn SandboxBackend> = match args.backend {
        Some(SandboxBackendKind::Docker) => {
            Arc::new(DockerBackend::from_config(&ctx.config.sandbox))
        }
        Some(SandboxBackendKind::Process) => Arc::new(ProcessBackend::new()),
        None => ctx.sandbox_backend(),
    };
    let validator = AttemptValidator::new(
        SandboxExecutor::new(backend),
        ctx.config.sandbox.per_command_timeout,
        ctx.config.sandbox.total_timeout,
    );

    let progress = (!ctx.robot_mode).then(|| spinner(format!("Validating {}", draft.name)));
    let outcome = validator.validate(&draft);
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if ctx.robot_mode {
        emit_json(&robot_ok(&outcome))?;
    } else {
        let mut layout = HumanLayout::new();
        layout.title(&draft.name);
        for result in &outcome.results {
            let mark = if result.succeeded() {
                style("✓").green()
            } else {
                style("✗").red()
            };
            layout.push_line(format!(
                "{mark} {} ({} ms)",
                result.command, result.duration_ms
            ));
        }
        layout.blank().kv(
            "Result",
            &if outcome.passed {
                style("passed").green().to_string()
            } else {
                style("failed").red().to_string()
            },
        );
        if !outcome.passed {
            layout.push_line(outcome.summary());
        }
        emit_human(layout);
    }

    Ok(if outcome.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
