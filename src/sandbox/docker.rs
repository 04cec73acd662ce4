//! Docker sandbox: one detached, network-less container per validation.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, warn};

use super::process::run_with_timeout;
use super::{RawOutput, Sandbox, SandboxBackend};
use crate::config::SandboxConfig;
use crate::error::{ForgeError, Result};

/// Ceiling for the `docker run` / `docker rm` housekeeping calls.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct DockerBackend {
    binary: Option<PathBuf>,
    image: String,
    memory: String,
    cpus: String,
    network: String,
}

impl DockerBackend {
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            binary: None,
            image: image.into(),
            memory: "512m".to_string(),
            cpus: "1".to_string(),
            network: "none".to_string(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            binary: config.docker_binary.clone(),
            image: config.image.clone(),
            memory: config.memory.clone(),
            cpus: config.cpus.clone(),
            network: config.network.clone(),
        }
    }

    fn docker(&self) -> Result<PathBuf> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => which::which("docker")
                .map_err(|_| ForgeError::Sandbox("Docker executable not found".to_string())),
        }
    }

    /// Arguments for the detached container that hosts a validation.
    #[must_use]
    pub fn run_args(&self) -> Vec<String> {
        [
            "run",
            "-d",
            "--rm",
            "--network",
            self.network.as_str(),
            "--memory",
            self.memory.as_str(),
            "--cpus",
            self.cpus.as_str(),
            "--workdir",
            "/root",
            self.image.as_str(),
            "sleep",
            "infinity",
        ]
        .iter()
        .map(|arg| (*arg).to_string())
        .collect()
    }
}

impl SandboxBackend for DockerBackend {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn provision(&self) -> Result<Box<dyn Sandbox>> {
        let docker = self.docker()?;
        let mut cmd = Command::new(&docker);
        cmd.args(self.run_args());
        let out = run_with_timeout(cmd, "docker run", CONTROL_TIMEOUT)?;
        if out.timed_out || out.exit_code != Some(0) {
            return Err(ForgeError::Sandbox(format!(
                "docker run failed: {}",
                out.stderr.trim()
            )));
        }
        let id = out.stdout.trim().to_string();
        if id.is_empty() {
            return Err(ForgeError::Sandbox(
                "docker run returned no container id".to_string(),
            ));
        }
        debug!(container = %id, image = %self.image, "container started");
        Ok(Box::new(DockerSandbox {
            docker,
            id,
            removed: false,
        }))
    }
}

struct DockerSandbox {
    docker: PathBuf,
    id: String,
    removed: bool,
}

impl Sandbox for DockerSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&mut self, command: &str, timeout: Duration) -> Result<RawOutput> {
        if self.removed {
            return Err(ForgeError::Sandbox(format!("container {} removed", self.id)));
        }
        let mut cmd = Command::new(&self.docker);
        cmd.args(["exec", self.id.as_str(), "sh", "-c", command]);
        run_with_timeout(cmd, command, timeout)
    }

    fn teardown(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        let mut cmd = Command::new(&self.docker);
        cmd.args(["rm", "-f", self.id.as_str()]);
        let out = run_with_timeout(cmd, "docker rm", CONTROL_TIMEOUT)?;
        if out.exit_code != Some(0) {
            warn!(container = %self.id, stderr = %out.stderr.trim(), "docker rm failed");
            return Err(ForgeError::Sandbox(format!(
                "docker rm -f {} failed: {}",
                self.id,
                out.stderr.trim()
            )));
        }
        Ok(())
    }
}
