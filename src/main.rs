//! skill-forge - research a topic, draft a SKILL.md, validate it in a sandbox.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use skill_forge::Result;
use skill_forge::app::AppContext;
use skill_forge::cli::Cli;
use skill_forge::cli::commands;
use skill_forge::cli::output::{emit_json, robot_error};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            if cli.robot {
                let _ = emit_json(&robot_error(error_code(&e), e.to_string()));
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if let Some(result) = commands::run_standalone(cli) {
        return result;
    }
    let ctx = AppContext::from_cli(cli)?;
    commands::run(&ctx, &cli.command)
}

fn error_code(err: &skill_forge::ForgeError) -> &'static str {
    use skill_forge::ForgeError;
    match err {
        ForgeError::Config(_) | ForgeError::MissingConfig(_) => "config",
        ForgeError::NotFound(_) => "not_found",
        ForgeError::Database(_) | ForgeError::Store(_) => "storage",
        ForgeError::Io(_) => "io",
        _ => "internal",
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,skill_forge=info",
        1 => "info,skill_forge=debug",
        2 => "debug,skill_forge=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
