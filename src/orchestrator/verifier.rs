//! Verification checks consulted by the acceptance gate.

use super::shell::run_shell;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// An idempotent, repeatable check whose result the gate trusts.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn run_checks(&self) -> Result<bool>;

    /// False when checks are skipped and `run_checks` always passes.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Runs a shell command; exit status 0 passes.
pub struct CommandVerifier {
    command: String,
    project_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandVerifier {
    pub fn new(command: impl Into<String>, project_dir: impl AsRef<Path>, timeout: Option<Duration>) -> Self {
        Self {
            command: command.into(),
            project_dir: project_dir.as_ref().to_path_buf(),
            timeout,
        }
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn run_checks(&self) -> Result<bool> {
        let envs = [("AUTOPILOT_ROOT", self.project_dir.display().to_string())];
        let Some(output) = run_shell(&self.command, &self.project_dir, &envs, self.timeout).await?
        else {
            bail!("Verification command timed out: {}", self.command);
        };
        debug!(command = %self.command, passed = output.success, "verification finished");
        Ok(output.success)
    }
}

/// Stand-in used when no verifier command is configured.
pub struct NoVerifier;

#[async_trait]
impl Verifier for NoVerifier {
    async fn run_checks(&self) -> Result<bool> {
        Ok(true)
    }

    fn is_configured(&self) -> bool {
        false
    }
}
