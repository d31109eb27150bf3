use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::autopilot_config::AutopilotToml;

/// Runtime configuration for autopilot.
///
/// Built once at startup from `ops/autopilot.toml`, the environment and CLI
/// arguments, then handed to every component. Nothing downstream resolves
/// paths or reads the environment on its own.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub registry_file: PathBuf,
    pub locks_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub reviews_dir: PathBuf,
    pub decision_log: PathBuf,
    pub log_dir: PathBuf,
    pub progress_file: PathBuf,
    pub todo_file: PathBuf,
    pub verbose: bool,
    /// The underlying file configuration, with environment overrides applied
    settings: AutopilotToml,
}

/// CLI overrides applied on top of file and environment settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_iterations: Option<u32>,
    pub cooldown_secs: Option<u64>,
    pub lock_ttl_minutes: Option<u64>,
}

impl Config {
    /// Build a config for `project_dir`, reading the process environment.
    pub fn new(project_dir: PathBuf, verbose: bool, overrides: CliOverrides) -> Result<Self> {
        Self::with_env(project_dir, verbose, overrides, |key| std::env::var(key).ok())
    }

    /// Build a config with an explicit environment lookup.
    pub fn with_env<F>(
        project_dir: PathBuf,
        verbose: bool,
        overrides: CliOverrides,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        let mut settings = AutopilotToml::load_or_default(&project_dir)?;
        settings.apply_env(lookup);

        if let Some(n) = overrides.max_iterations {
            settings.loop_settings.max_iterations = n;
        }
        if let Some(secs) = overrides.cooldown_secs {
            settings.loop_settings.cooldown_secs = secs;
        }
        if let Some(minutes) = overrides.lock_ttl_minutes {
            settings.locks.ttl_minutes = minutes;
        }

        Ok(Self::from_settings(project_dir, verbose, settings))
    }

    /// Build a config from already-resolved settings.
    pub fn from_settings(project_dir: PathBuf, verbose: bool, settings: AutopilotToml) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                project_dir.join(p)
            }
        };

        Self {
            registry_file: resolve(&settings.paths.registry),
            locks_dir: resolve(&settings.paths.locks_dir),
            runs_dir: resolve(&settings.paths.runs_dir),
            reviews_dir: resolve(&settings.paths.reviews_dir),
            decision_log: resolve(&settings.paths.decision_log),
            log_dir: resolve(&settings.paths.log_dir),
            progress_file: resolve(&settings.paths.progress_file),
            todo_file: resolve(&settings.paths.todo_file),
            project_dir,
            verbose,
            settings,
        }
    }

    pub fn settings(&self) -> &AutopilotToml {
        &self.settings
    }

    pub fn max_iterations(&self) -> u32 {
        self.settings.loop_settings.max_iterations
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.settings.loop_settings.cooldown_secs)
    }

    pub fn review_pending_when_idle(&self) -> bool {
        self.settings.loop_settings.review_pending_when_idle
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.locks.ttl_minutes * 60)
    }

    pub fn evidence_extensions(&self) -> &[String] {
        &self.settings.evidence.extensions
    }

    pub fn executor_command(&self) -> Option<&str> {
        self.settings.executor.command.as_deref()
    }

    pub fn executor_timeout(&self) -> Option<Duration> {
        self.settings.executor.timeout_secs.map(Duration::from_secs)
    }

    pub fn reviewer_command(&self) -> Option<&str> {
        self.settings.reviewer.command.as_deref()
    }

    pub fn require_verifier(&self) -> bool {
        self.settings.gate.require_verifier
    }

    pub fn verifier_command(&self) -> Option<&str> {
        self.settings.verifier.command.as_deref()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        let registry_dir = self.registry_file.parent().unwrap_or(&self.project_dir);
        let log_parent = self.decision_log.parent().unwrap_or(&self.project_dir);
        for dir in [
            registry_dir,
            log_parent,
            &self.locks_dir,
            &self.runs_dir,
            &self.reviews_dir,
            &self.log_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}
