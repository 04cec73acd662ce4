//! Command-line interface definitions.
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Skill Forge - research a topic, draft a SKILL.md, validate it in a sandbox
#[derive(Parser, Debug)]
#[command(name = "skill-forge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit JSON on stdout for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/skill-forge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research, draft and validate a skill for one topic
    Learn(commands::learn::LearnArgs),

    /// Learn every topic listed in `pipeline.topics`
    LearnAll(commands::learn_all::LearnAllArgs),

    /// Aggregate statistics over saved skills
    Status(commands::status::StatusArgs),

    /// List the latest record of each skill
    List(commands::list::ListArgs),

    /// Show one skill's latest record
    Show(commands::show::ShowArgs),

    /// Show recent lifecycle events
    Events(commands::events::EventsArgs),

    /// Check a SKILL.md file's structure
    Lint(commands::lint::LintArgs),

    /// Run a SKILL.md file's procedure in the sandbox
    Validate(commands::validate::ValidateArgs),

    /// Check API keys, Docker, the database and publishing setup
    Doctor(commands::doctor::DoctorArgs),

    /// Send the daily summary, once or on a schedule
    Summary(commands::summary::SummaryArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["skill-forge", "learn", "docker", "--robot", "-vv"]).unwrap();
        assert!(cli.robot);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Learn(args) => assert_eq!(args.topic, "docker"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn doctor_accepts_single_check() {
        let cli = Cli::try_parse_from(["skill-forge", "doctor", "--check", "store"]).unwrap();
        match cli.command {
            Commands::Doctor(args) => assert_eq!(args.check.as_deref(), Some("store")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn learn_requires_topic() {
        assert!(Cli::try_parse_from(["skill-forge", "learn"]).is_err());
    }
}
