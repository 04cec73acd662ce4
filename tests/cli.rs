use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use skill_forge::test_utils::fixtures::UnitTestFixture;
use tempfile::tempdir;

/// Command isolated from the user's config, data and API keys.
fn forge(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("skill-forge").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env("FORGE_DB_PATH", home.join("forge.db"))
        .env("FORGE_SKILLS_DIR", home.join("skills"))
        .env_remove("SKILL_FORGE_CONFIG")
        .env_remove("FIRECRAWL_API_KEY")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITHUB_SKILLS_REPO")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("TELEGRAM_CHAT_ID")
        .env_remove("RUST_LOG");
    cmd
}


#[test]
fn test_cli_help() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("learn-all"));
}

#[test]
fn test_cli_version() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_lint_valid_skill() {
    let fixture = UnitTestFixture::new();
    let path = fixture.create_skill("docker-basics", &["echo one", "echo two"]);

    let output = forge(&fixture.data_path)
        .args(["--robot", "lint"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["data"]["valid"], Value::Bool(true));
    assert_eq!(json["data"]["commands"], 2);
}

#[test]
fn test_lint_invalid_skill_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("SKILL.md");
    std::fs::write(&path, "# Missing frontmatter\n\n## Procedure\n1. Do it\n").unwrap();

    forge(dir.path())
        .arg("lint")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("error:"));
}

#[test]
fn test_completions_bash() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skill-forge"));
}

#[test]
fn test_status_on_empty_database() {
    let dir = tempdir().unwrap();
    let output = forge(dir.path()).args(["--robot", "status"]).output().unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["total"], 0);
    assert_eq!(json["data"]["success_rate"], 0.0);
    assert!(dir.path().join("forge.db").exists());
}

#[test]
fn test_list_on_empty_database() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No skills saved yet."));
}

#[test]
fn test_show_missing_skill() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .args(["show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("skill not found: nope"));
}

#[test]
fn test_show_missing_skill_robot_error() {
    let dir = tempdir().unwrap();
    let output = forge(dir.path())
        .args(["--robot", "show", "nope"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["status"]["error"]["code"], "not_found");
}

#[test]
fn test_learn_requires_api_keys() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .args(["learn", "docker"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FIRECRAWL_API_KEY"));
}

#[test]
fn test_learn_all_without_topics() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .arg("learn-all")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no topics"));
}

#[test]
fn test_project_config_is_loaded() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".skill-forge")).unwrap();
    std::fs::write(
        dir.path().join(".skill-forge/config.toml"),
        "[pipeline]\nmax_attempts = 0\n",
    )
    .unwrap();

    forge(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_attempts"));
}

#[cfg(unix)]
#[test]
fn test_validate_with_process_backend() {
    let fixture = UnitTestFixture::new();
    let passing = fixture.create_skill("docker-basics", &["echo hello", "test -d ."]);

    forge(&fixture.data_path)
        .args(["validate", "--backend", "process"])
        .arg(&passing)
        .assert()
        .success()
        .stdout(predicate::str::contains("passed"));
}

#[cfg(unix)]
#[test]
fn test_validate_reports_failing_command() {
    let fixture = UnitTestFixture::new();
    let failing = fixture.create_skill("docker-basics", &["echo hello", "exit 3", "echo unreachable"]);

    let output = forge(&fixture.data_path)
        .args(["--robot", "validate", "--backend", "process"])
        .arg(&failing)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["passed"], Value::Bool(false));
    assert_eq!(json["data"]["failing_step"], 1);
    assert_eq!(json["data"]["results"].as_array().unwrap().len(), 2);
}

#[test]
fn test_doctor_store_check_passes() {
    let dir = tempdir().unwrap();
    let output = forge(dir.path())
        .args(["--robot", "doctor", "--check", "store"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["healthy"], Value::Bool(true));
    assert_eq!(json["data"]["checks"][0]["name"], "store");
    assert_eq!(json["data"]["checks"][0]["status"], "ok");
}

#[test]
fn test_doctor_reports_missing_api_keys() {
    let dir = tempdir().unwrap();
    let output = forge(dir.path())
        .args(["--robot", "doctor"])
        .env("FORGE_SANDBOX_BACKEND", "process")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["data"]["healthy"], Value::Bool(false));
    let checks = json["data"]["checks"].as_array().unwrap();
    let names: Vec<&str> = checks.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["env", "docker", "store", "research", "publish"]);
    assert_eq!(checks[0]["status"], "error");
    assert!(checks[0]["details"].as_str().unwrap().contains("OPENROUTER_API_KEY"));
    assert_eq!(checks[4]["status"], "warn");
}

#[test]
fn test_doctor_rejects_unknown_check() {
    let dir = tempdir().unwrap();
    forge(dir.path())
        .args(["doctor", "--check", "network"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown check network"));
}
