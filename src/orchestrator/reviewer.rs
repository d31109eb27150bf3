//! Review text providers.

use super::shell::{run_shell, task_env};
use crate::evidence::ArtifactProbe;
use crate::task::Task;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Produces the free-form text the acceptance gate parses.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, task: &Task) -> Result<String>;
}

/// Reads the newest review report that mentions the task.
///
/// No report yields empty text, which the gate reads as an absent signal.
pub struct ReportReviewer {
    reports: ArtifactProbe,
}

impl ReportReviewer {
    pub fn new(reviews_dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            reports: ArtifactProbe::new(reviews_dir, extensions),
        }
    }

    pub fn latest_report(&self, task_id: &str) -> Option<PathBuf> {
        self.reports.reports_for(task_id).into_iter().next()
    }
}

#[async_trait]
impl Reviewer for ReportReviewer {
    async fn review(&self, task: &Task) -> Result<String> {
        match self.latest_report(&task.id) {
            Some(path) => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read review report: {}", path.display())),
            None => Ok(String::new()),
        }
    }
}

/// Runs a review command and returns its stdout.
pub struct CommandReviewer {
    command: String,
    project_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandReviewer {
    pub fn new(command: impl Into<String>, project_dir: impl AsRef<Path>, timeout: Option<Duration>) -> Self {
        Self {
            command: command.into(),
            project_dir: project_dir.as_ref().to_path_buf(),
            timeout,
        }
    }
}

#[async_trait]
impl Reviewer for CommandReviewer {
    async fn review(&self, task: &Task) -> Result<String> {
        let envs = task_env(task, &self.project_dir);
        let Some(output) = run_shell(&self.command, &self.project_dir, &envs, self.timeout).await?
        else {
            bail!("Reviewer command timed out for task {}", task.id);
        };
        if !output.success {
            bail!(
                "Reviewer command failed for task {} (exit {}): {}",
                task.id,
                output.exit_code.unwrap_or(-1),
                output.stderr.trim()
            );
        }
        Ok(output.stdout)
    }
}
