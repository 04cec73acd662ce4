//! CLI command implementations
//!
//! Each subcommand has its own module with an Args struct and a `run()`
//! function.

use std::process::ExitCode;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::error::Result;

pub mod completions;
pub mod doctor;
pub mod events;
pub mod learn;
pub mod learn_all;
pub mod lint;
pub mod list;
pub mod show;
pub mod status;
pub mod summary;
pub mod validate;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<ExitCode> {
    match command {
        Commands::Learn(args) => learn::run(ctx, args),
        Commands::LearnAll(args) => learn_all::run(ctx, args),
        Commands::Status(args) => status::run(ctx, args).map(|()| ExitCode::SUCCESS),
        Commands::List(args) => list::run(ctx, args).map(|()| ExitCode::SUCCESS),
        Commands::Show(args) => show::run(ctx, args).map(|()| ExitCode::SUCCESS),
        Commands::Events(args) => events::run(ctx, args).map(|()| ExitCode::SUCCESS),
        Commands::Lint(args) => lint::run(ctx.robot_mode, args),
        Commands::Validate(args) => validate::run(ctx, args),
        Commands::Doctor(args) => doctor::run(ctx, args),
        Commands::Summary(args) => summary::run(ctx, args).map(|()| ExitCode::SUCCESS),
        Commands::Completions(args) => completions::run(args).map(|()| ExitCode::SUCCESS),
    }
}

/// Run a command that needs no [`AppContext`].
pub fn run_standalone(cli: &Cli) -> Option<Result<ExitCode>> {
    match &cli.command {
        Commands::Lint(args) => Some(lint::run(cli.robot, args)),
        Commands::Completions(args) => Some(completions::run(args).map(|()| ExitCode::SUCCESS)),
        _ => None,
    }
}
