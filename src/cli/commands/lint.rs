//! skill-forge lint - structural checks on a SKILL.md file

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use console::style;
use serde::Serialize;

use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::core::draft::{Draft, StructureReport};
use crate::error::Result;

#[derive(Args, Debug)]
pub struct LintArgs {
    /// Path to a SKILL.md file
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct LintReport {
    pub file: PathBuf,
    pub name: String,
    pub valid: bool,
    pub commands: usize,
    #[serde(flatten)]
    pub structure: StructureReport,
}

/// Lint `content` as if read from `file`.
#[must_use]
pub fn lint_content(file: PathBuf, content: &str) -> LintReport {
    let topic = file
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("skill")
        .to_string();
    let draft = Draft::from_markdown(&topic, content);
    let mut structure = draft.check();
    let commands = match draft.procedure() {
        Ok(procedure) => procedure.commands().len(),
        Err(err) => {
            if structure.is_valid() {
                structure.errors.push(err.to_string());
            }
            0
        }
    };

    LintReport {
        file,
        name: draft.name,
        valid: structure.is_valid(),
        commands,
        structure,
    }
}

pub fn run(robot_mode: bool, args: &LintArgs) -> Result<ExitCode> {
    let content = std::fs::read_to_string(&args.file)?;
    let report = lint_content(args.file.clone(), &content);

    if robot_mode {
        emit_json(&robot_ok(&report))?;
    } else {
        let mut layout = HumanLayout::new();
        let verdict = if report.valid {
            style("ok").green().to_string()
        } else {
            style("invalid").red().to_string()
        };
        layout
            .kv("File", &report.file.display().to_string())
            .kv("Skill", &report.name)
            .kv("Result", &verdict)
            .kv("Commands", &report.commands.to_string());
        for error in &report.structure.errors {
            layout.bullet(&format!("{} {error}", style("error:").red()));
        }
        for warning in &report.structure.warnings {
            layout.bullet(&format!("{} {warning}", style("warning:").yellow()));
        }
        emit_human(layout);
    }

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::sample_skill_md;

    #[test]
    fn valid_skill_counts_commands() {
        let content = sample_skill_md("docker-basics", "docker", &["docker --version", "echo ok"]);
        let report = lint_content(PathBuf::from("skills/docker-basics/SKILL.md"), &content);
        assert!(report.valid, "{:?}", report.structure.errors);
        assert_eq!(report.commands, 2);
        assert_eq!(report.name, "docker-basics");
    }

    #[test]
    fn missing_frontmatter_is_invalid() {
        let report = lint_content(PathBuf::from("SKILL.md"), "# Title\n\n## Procedure\n1. step\n");
        assert!(!report.valid);
        assert!(!report.structure.errors.is_empty());
    }
}
