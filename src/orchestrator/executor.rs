//! Task execution.
//!
//! The core does not care how work gets done, only whether it succeeded and,
//! if not, whether the failure is worth retrying.

use super::shell::{run_shell, task_env};
use crate::errors::ExecutionError;
use crate::task::Task;
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a successful execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    /// Where the executor wrote its output, if anywhere
    pub log_file: Option<PathBuf>,
}

/// Dispatches a task to an external agent or process.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, task: &Task) -> Result<ExecutionReport, ExecutionError>;
}

/// Runs a configured shell command once per task.
///
/// Task identity is passed through `AUTOPILOT_*` environment variables and
/// combined output lands in `<log_dir>/<task>-<timestamp>-output.log`.
pub struct CommandExecutor {
    command: String,
    project_dir: PathBuf,
    log_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new(
        command: impl Into<String>,
        project_dir: impl AsRef<Path>,
        log_dir: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            command: command.into(),
            project_dir: project_dir.as_ref().to_path_buf(),
            log_dir: log_dir.as_ref().to_path_buf(),
            timeout,
        }
    }

    fn log_path(&self, task: &Task) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        self.log_dir
            .join(format!("{}-{}-output.log", task.id, stamp))
    }

    fn write_log(&self, task: &Task, content: &str) -> Option<PathBuf> {
        let path = self.log_path(task);
        let written = std::fs::create_dir_all(&self.log_dir)
            .and_then(|_| std::fs::write(&path, content));
        match written {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "failed to write executor log");
                None
            }
        }
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(&self, task: &Task) -> Result<ExecutionReport, ExecutionError> {
        debug!(task_id = %task.id, command = %self.command, "executing task");
        let envs = task_env(task, &self.project_dir);

        let output = run_shell(&self.command, &self.project_dir, &envs, self.timeout)
            .await
            .map_err(|e| ExecutionError::Terminal(format!("{e:#}")))?;

        let Some(output) = output else {
            let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
            return Err(ExecutionError::Transient(format!(
                "executor timed out after {secs}s"
            )));
        };

        let combined = output.combined();
        let log_file = self.write_log(task, &combined);

        if output.success {
            Ok(ExecutionReport { log_file })
        } else {
            let code = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            debug!(task_id = %task.id, exit = %code, "executor failed");
            Err(ExecutionError::from_output(&combined))
        }
    }
}
