//! `sh -c` plumbing shared by the command-backed collaborators.

use crate::task::Task;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of a finished shell command.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Run `command` through `sh -c` in `cwd`.
///
/// Returns `Ok(None)` when `limit` elapsed first; the child is killed.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    envs: &[(&str, String)],
    limit: Option<Duration>,
) -> Result<Option<ShellOutput>> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn command: {}", command))?;

    let output = match limit {
        Some(limit) => match timeout(limit, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for command")?,
            Err(_) => return Ok(None),
        },
        None => child
            .wait_with_output()
            .await
            .context("Failed to wait for command")?,
    };

    Ok(Some(ShellOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }))
}

/// Environment handed to commands working on `task`.
pub fn task_env(task: &Task, root: &Path) -> Vec<(&'static str, String)> {
    vec![
        ("AUTOPILOT_TASK_ID", task.id.clone()),
        ("AUTOPILOT_OWNER", task.owner.clone()),
        ("AUTOPILOT_TITLE", task.title().unwrap_or_default().to_string()),
        ("AUTOPILOT_ROOT", root.display().to_string()),
    ]
}
