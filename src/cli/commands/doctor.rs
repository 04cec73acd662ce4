//! skill-forge doctor - environment and connectivity checks

use std::process::{Command, ExitCode};
use std::time::Duration;

use clap::Args;
use console::style;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, robot_ok};
use crate::config::{Config, SandboxBackendKind};
use crate::error::{ForgeError, Result};
use crate::publish::GitHubPublisher;
use crate::research::firecrawl::FirecrawlResearcher;
use crate::sandbox::process::run_with_timeout;
use crate::storage::Database;

const CHECKS: &[&str] = &["env", "docker", "store", "research", "publish"];

const DOCKER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Run a specific check only (env, docker, store, research, publish)
    #[arg(long)]
    pub check: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self {
            name,
            status,
            details: details.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    healthy: bool,
    checks: Vec<CheckResult>,
}

pub fn run(ctx: &AppContext, args: &DoctorArgs) -> Result<ExitCode> {
    let selected: Vec<&str> = match args.check.as_deref() {
        Some(name) if CHECKS.contains(&name) => vec![name],
        Some(other) => {
            return Err(ForgeError::Config(format!(
                "unknown check {other} (available: {})",
                CHECKS.join(", ")
            )));
        }
        None => CHECKS.to_vec(),
    };

    let checks: Vec<CheckResult> = selected
        .into_iter()
        .map(|name| match name {
            "env" => check_env(&ctx.config),
            "docker" => check_docker(&ctx.config),
            "store" => check_store(&ctx.db),
            "research" => check_research(&ctx.config),
            _ => check_publish(&ctx.config),
        })
        .collect();
    let healthy = checks.iter().all(|check| check.status != CheckStatus::Error);

    if ctx.robot_mode {
        emit_json(&robot_ok(DoctorReport { healthy, checks }))?;
    } else {
        let mut layout = HumanLayout::new();
        layout.title("skill-forge doctor");
        for check in &checks {
            let label = match check.status {
                CheckStatus::Ok => style("ok").green().to_string(),
                CheckStatus::Warn => style("warn").yellow().to_string(),
                CheckStatus::Error => style("error").red().to_string(),
            };
            layout.kv(check.name, &format!("{label}  {}", check.details));
        }
        layout.blank();
        if healthy {
            layout.push_line(style("All checks passed").green().bold().to_string());
        } else {
            layout.push_line(style("Some checks failed").red().bold().to_string());
        }
        emit_human(layout);
    }

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn env_present(key: &str) -> bool {
    std::env::var(key).is_ok_and(|value| !value.trim().is_empty())
}

/// API keys are required; notification and publish credentials are not.
pub fn check_env(config: &Config) -> CheckResult {
    let missing: Vec<&str> = [config.llm.api_key_env.as_str(), config.research.api_key_env.as_str()]
        .into_iter()
        .filter(|key| !env_present(key))
        .collect();
    if !missing.is_empty() {
        return CheckResult::new(
            "env",
            CheckStatus::Error,
            format!("Missing env vars: {}", missing.join(", ")),
        );
    }

    let mut optional = Vec::new();
    if config.notify.enabled {
        optional.push(config.notify.bot_token_env.as_str());
        optional.push(config.notify.chat_id_env.as_str());
    }
    if config.publish.enabled {
        optional.push(config.publish.token_env.as_str());
    }
    let optional_missing: Vec<&str> = optional.into_iter().filter(|key| !env_present(key)).collect();
    if optional_missing.is_empty() {
        CheckResult::new("env", CheckStatus::Ok, "All env vars present")
    } else {
        CheckResult::new(
            "env",
            CheckStatus::Warn,
            format!("Optional env vars not set: {}", optional_missing.join(", ")),
        )
    }
}

/// Docker is only required by the docker sandbox backend.
pub fn check_docker(config: &Config) -> CheckResult {
    let severity = match config.sandbox.backend {
        SandboxBackendKind::Docker => CheckStatus::Error,
        SandboxBackendKind::Process => CheckStatus::Warn,
    };
    let binary = match &config.sandbox.docker_binary {
        Some(path) => path.clone(),
        None => match which::which("docker") {
            Ok(path) => path,
            Err(_) => {
                return CheckResult::new("docker", severity, "docker executable not found on PATH");
            }
        },
    };

    let mut cmd = Command::new(&binary);
    cmd.args(["version", "--format", "{{.Server.Version}}"]);
    match run_with_timeout(cmd, "docker version", DOCKER_TIMEOUT) {
        Ok(out) if out.timed_out => {
            CheckResult::new("docker", severity, "docker version timed out")
        }
        Ok(out) if out.exit_code == Some(0) => {
            let version = out.stdout.trim();
            let version = if version.is_empty() { "<unknown>" } else { version };
            CheckResult::new("docker", CheckStatus::Ok, format!("Docker server {version}"))
        }
        Ok(out) => CheckResult::new(
            "docker",
            severity,
            format!(
                "docker exited with code {}: {}",
                out.exit_code.map_or_else(|| "?".to_string(), |code| code.to_string()),
                out.stderr.trim()
            ),
        ),
        Err(err) => CheckResult::new("docker", severity, err.to_string()),
    }
}

pub fn check_store(db: &Database) -> CheckResult {
    match db.integrity_check() {
        Ok(true) => CheckResult::new(
            "store",
            CheckStatus::Ok,
            format!("SQLite OK (schema v{})", db.schema_version()),
        ),
        Ok(false) => CheckResult::new("store", CheckStatus::Error, "integrity check failed"),
        Err(err) => CheckResult::new("store", CheckStatus::Error, err.to_string()),
    }
}

/// Builds the research client without calling the API.
pub fn check_research(config: &Config) -> CheckResult {
    match FirecrawlResearcher::from_config(&config.research) {
        Ok(_) => CheckResult::new(
            "research",
            CheckStatus::Ok,
            format!("Research client ready ({})", config.research.base_url),
        ),
        Err(err) => CheckResult::new("research", CheckStatus::Error, err.to_string()),
    }
}

pub fn check_publish(config: &Config) -> CheckResult {
    if !config.publish.enabled {
        return CheckResult::new("publish", CheckStatus::Ok, "Publishing disabled");
    }
    match GitHubPublisher::from_config(&config.publish) {
        Ok(Some(_)) => CheckResult::new(
            "publish",
            CheckStatus::Ok,
            format!(
                "Publishing to {} ({})",
                config.publish.repo.as_deref().unwrap_or_default(),
                config.publish.branch
            ),
        ),
        Ok(None) => CheckResult::new(
            "publish",
            CheckStatus::Warn,
            format!(
                "{} or repo not set; saved skills stay local",
                config.publish.token_env
            ),
        ),
        Err(err) => CheckResult::new("publish", CheckStatus::Error, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn isolated_config() -> Config {
        let mut config = Config::default();
        config.llm.api_key_env = "SKILL_FORGE_TEST_UNSET_LLM_KEY".to_string();
        config.research.api_key_env = "SKILL_FORGE_TEST_UNSET_RESEARCH_KEY".to_string();
        config.publish.token_env = "SKILL_FORGE_TEST_UNSET_GITHUB_TOKEN".to_string();
        config.sandbox.docker_binary = Some(PathBuf::from("/nonexistent/skill-forge/docker"));
        config
    }

    #[test]
    fn missing_api_keys_are_errors() {
        let check = check_env(&isolated_config());
        assert_eq!(check.status, CheckStatus::Error);
        assert!(check.details.contains("SKILL_FORGE_TEST_UNSET_LLM_KEY"));
        assert!(check.details.contains("SKILL_FORGE_TEST_UNSET_RESEARCH_KEY"));
    }

    #[test]
    fn api_keys_present_with_optional_missing_warns() {
        let mut config = isolated_config();
        config.llm.api_key_env = "PATH".to_string();
        config.research.api_key_env = "PATH".to_string();
        let check = check_env(&config);
        assert_eq!(check.status, CheckStatus::Warn);
        assert!(check.details.contains("SKILL_FORGE_TEST_UNSET_GITHUB_TOKEN"));
    }

    #[test]
    fn missing_docker_severity_follows_backend() {
        let mut config = isolated_config();
        config.sandbox.backend = SandboxBackendKind::Docker;
        assert_eq!(check_docker(&config).status, CheckStatus::Error);
        config.sandbox.backend = SandboxBackendKind::Process;
        assert_eq!(check_docker(&config).status, CheckStatus::Warn);
    }

    #[test]
    fn store_check_reports_schema() {
        let db = Database::open_in_memory().unwrap();
        let check = check_store(&db);
        assert_eq!(check.status, CheckStatus::Ok);
        assert!(check.details.contains("schema v"));
    }

    #[test]
    fn research_needs_api_key() {
        let check = check_research(&isolated_config());
        assert_eq!(check.status, CheckStatus::Error);
        assert!(check.details.contains("SKILL_FORGE_TEST_UNSET_RESEARCH_KEY"));
    }

    #[test]
    fn publish_without_credentials_warns() {
        let mut config = isolated_config();
        assert_eq!(check_publish(&config).status, CheckStatus::Warn);
        config.publish.enabled = false;
        assert_eq!(check_publish(&config).status, CheckStatus::Ok);
    }
}
