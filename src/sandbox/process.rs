//! Local process sandbox: a scratch directory and a scrubbed environment.
//!
//! Isolation is limited to the working directory and environment, so this
//! backend is meant for development and tests. Use [`super::DockerBackend`]
//! for untrusted procedures.

use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

use super::{RawOutput, Sandbox, SandboxBackend};
use crate::error::{ForgeError, Result};

/// Captured output kept per stream; older bytes are dropped.
const OUTPUT_LIMIT: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Minimum wait for the output readers after the command exits.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

#[derive(Debug, Clone, Default)]
pub struct ProcessBackend {
    /// Shell used to interpret each command.
    shell: Option<String>,
}

impl ProcessBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

impl SandboxBackend for ProcessBackend {
    fn name(&self) -> &'static str {
        "process"
    }

    fn provision(&self) -> Result<Box<dyn Sandbox>> {
        let dir = tempfile::Builder::new()
            .prefix("skill-forge-")
            .tempdir()
            .map_err(|err| ForgeError::Sandbox(format!("create scratch dir: {err}")))?;
        let id = format!("process-{}", Uuid::new_v4().simple());
        debug!(sandbox = %id, dir = %dir.path().display(), "process sandbox created");
        Ok(Box::new(ProcessSandbox {
            id,
            dir: Some(dir),
            shell: self.shell.clone().unwrap_or_else(|| "sh".to_string()),
        }))
    }
}

struct ProcessSandbox {
    id: String,
    dir: Option<TempDir>,
    shell: String,
}

impl Sandbox for ProcessSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&mut self, command: &str, timeout: Duration) -> Result<RawOutput> {
        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| ForgeError::Sandbox(format!("{} was torn down", self.id)))?;
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);
        scrub_env(&mut cmd, dir.path());
        run_with_timeout(cmd, command, timeout)
    }

    fn teardown(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()
                .map_err(|err| ForgeError::Sandbox(format!("remove scratch dir: {err}")))?;
        }
        Ok(())
    }
}

fn scrub_env(cmd: &mut Command, dir: &Path) {
    let path = std::env::var("PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());
    cmd.current_dir(dir)
        .env_clear()
        .env("PATH", path)
        .env("HOME", dir)
        .env("TMPDIR", dir)
        .env("LANG", "C.UTF-8");
}

/// Spawn `cmd`, capture both streams, and kill it after `timeout`.
///
/// The whole process group is killed once the leader exits, so background
/// children cannot hold the output pipes open past the deadline.
pub(crate) fn run_with_timeout(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
) -> Result<RawOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let start = Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|err| ForgeError::Sandbox(format!("failed to execute '{label}': {err}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ForgeError::Sandbox(format!("failed to capture stdout for '{label}'")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ForgeError::Sandbox(format!("failed to capture stderr for '{label}'")))?;

    let stdout_rx = spawn_reader(stdout);
    let stderr_rx = spawn_reader(stderr);

    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    timed_out = true;
                    kill_tree(&mut child);
                    break child.wait().map_err(|err| {
                        ForgeError::Sandbox(format!("failed to wait for '{label}': {err}"))
                    })?;
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                kill_tree(&mut child);
                return Err(ForgeError::Sandbox(format!(
                    "failed to wait for '{label}': {err}"
                )));
            }
        }
    };
    kill_group(child.id());

    let drain_deadline =
        Instant::now() + timeout.saturating_sub(start.elapsed()).max(DRAIN_GRACE);
    let stdout = collect(&stdout_rx, drain_deadline);
    let stderr = collect(&stderr_rx, drain_deadline);
    if stdout.is_none() || stderr.is_none() {
        debug!(command = %label, "output pipes still open after the command exited");
        timed_out = true;
    }

    let mut stderr = String::from_utf8_lossy(&stderr.unwrap_or_default()).into_owned();
    if timed_out {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        let _ = write!(stderr, "Timed out after {}s", timeout.as_secs_f64());
    }

    Ok(RawOutput {
        exit_code: if timed_out { None } else { status.code() },
        stdout: String::from_utf8_lossy(&stdout.unwrap_or_default()).into_owned(),
        stderr,
        timed_out,
        duration: start.elapsed(),
    })
}

fn spawn_reader(reader: impl Read + Send + 'static) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(read_capped(reader));
    });
    rx
}

/// Captured bytes, or `None` if the stream is still open at `deadline`.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Option<Vec<u8>> {
    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
        .ok()
}

/// Kill the child and, on unix, the process group it leads.
fn kill_tree(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
}

fn kill_group(pgid: u32) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .arg("-KILL")
            .arg("--")
            .arg(format!("-{pgid}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    #[cfg(not(unix))]
    let _ = pgid;
}

fn read_capped(mut reader: impl Read) -> Vec<u8> {
    let mut kept = Vec::new();
    let mut chunk = [0_u8; 8192];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                kept.extend_from_slice(&chunk[..n]);
                if kept.len() > OUTPUT_LIMIT * 2 {
                    kept.drain(..kept.len() - OUTPUT_LIMIT);
                }
            }
        }
    }
    if kept.len() > OUTPUT_LIMIT {
        kept.drain(..kept.len() - OUTPUT_LIMIT);
    }
    kept
}
