//! File-backed configuration for autopilot.
//!
//! This module reads `ops/autopilot.toml`. Every section is optional and
//! falls back to the defaults of the original `ops/` + `docs/` layout.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! registry = "ops/queue.jsonl"
//! locks_dir = "ops/locks"
//! runs_dir = "docs/runs"
//! reviews_dir = "docs/orchestrator/reviews"
//! decision_log = "ops/gate-decisions.jsonl"
//! log_dir = "logs"
//! progress_file = "docs/PROGRESS.md"
//! todo_file = "docs/TODO_MASTER.md"
//!
//! [loop]
//! max_iterations = 100
//! cooldown_secs = 10
//! review_pending_when_idle = true
//!
//! [retry]
//! max_attempts = 3
//! base_delay_secs = 5
//! max_delay_secs = 30
//! jitter = 0.2
//!
//! [locks]
//! ttl_minutes = 60
//!
//! [evidence]
//! extensions = ["md"]
//!
//! [gate]
//! require_verifier = false
//!
//! [executor]
//! command = "cursor-agent -p \"$AUTOPILOT_TASK_ID\" --force"
//! timeout_secs = 3600
//!
//! [reviewer]
//! command = "./scripts/review.sh"
//!
//! [verifier]
//! command = "make test"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file inside the `ops/` directory.
pub const CONFIG_FILE: &str = "autopilot.toml";

/// Location of the configuration file for a project root.
pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join("ops").join(CONFIG_FILE)
}

/// Locations of every persisted artifact, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_registry")]
    pub registry: PathBuf,
    #[serde(default = "default_locks_dir")]
    pub locks_dir: PathBuf,
    /// Evidence location scanned for run reports
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    #[serde(default = "default_reviews_dir")]
    pub reviews_dir: PathBuf,
    #[serde(default = "default_decision_log")]
    pub decision_log: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,
    #[serde(default = "default_todo_file")]
    pub todo_file: PathBuf,
}

fn default_registry() -> PathBuf {
    PathBuf::from("ops/queue.jsonl")
}

fn default_locks_dir() -> PathBuf {
    PathBuf::from("ops/locks")
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("docs/runs")
}

fn default_reviews_dir() -> PathBuf {
    PathBuf::from("docs/orchestrator/reviews")
}

fn default_decision_log() -> PathBuf {
    PathBuf::from("ops/gate-decisions.jsonl")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("docs/PROGRESS.md")
}

fn default_todo_file() -> PathBuf {
    PathBuf::from("docs/TODO_MASTER.md")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            locks_dir: default_locks_dir(),
            runs_dir: default_runs_dir(),
            reviews_dir: default_reviews_dir(),
            decision_log: default_decision_log(),
            log_dir: default_log_dir(),
            progress_file: default_progress_file(),
            todo_file: default_todo_file(),
        }
    }
}

/// Supervisory loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Gate in-progress tasks that already have evidence when nothing is ready
    #[serde(default = "default_review_pending_when_idle")]
    pub review_pending_when_idle: bool,
}

fn default_max_iterations() -> u32 {
    100
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_review_pending_when_idle() -> bool {
    true
}

impl Default for LoopSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            cooldown_secs: default_cooldown_secs(),
            review_pending_when_idle: default_review_pending_when_idle(),
        }
    }
}

/// Backoff settings around transient executor failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Fraction of the delay randomized in either direction (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksSection {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

fn default_ttl_minutes() -> u64 {
    60
}

impl Default for LocksSection {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSection {
    /// File extensions that count as run reports
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

impl Default for EvidenceSection {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSection {
    /// Reject instead of skipping verification when no verifier is configured
    #[serde(default)]
    pub require_verifier: bool,
}

/// A shell command backing one of the external collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// The complete autopilot.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutopilotToml {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default, rename = "loop")]
    pub loop_settings: LoopSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub locks: LocksSection,
    #[serde(default)]
    pub evidence: EvidenceSection,
    #[serde(default)]
    pub gate: GateSection,
    #[serde(default)]
    pub executor: CommandSection,
    #[serde(default)]
    pub reviewer: CommandSection,
    #[serde(default)]
    pub verifier: CommandSection,
}

impl AutopilotToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse autopilot.toml")
    }

    /// Load `ops/autopilot.toml` under the project root, or defaults if absent.
    pub fn load_or_default(project_dir: &Path) -> Result<Self> {
        let config_path = config_path(project_dir);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize autopilot.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides on top of the file values.
    ///
    /// `lookup` abstracts the environment so callers (and tests) decide where
    /// values come from; only the config layer ever consults it.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup("AUTOPILOT_MAX_LOOPS").and_then(|v| v.parse().ok()) {
            self.loop_settings.max_iterations = n;
        }
        if let Some(n) = lookup("AUTOPILOT_SLEEP_SECONDS").and_then(|v| v.parse().ok()) {
            self.loop_settings.cooldown_secs = n;
        }
        if let Some(cmd) = lookup("AUTOPILOT_EXECUTOR_CMD").filter(|v| !v.trim().is_empty()) {
            self.executor.command = Some(cmd);
        }
        if let Some(cmd) = lookup("AUTOPILOT_REVIEWER_CMD").filter(|v| !v.trim().is_empty()) {
            self.reviewer.command = Some(cmd);
        }
        if let Some(cmd) = lookup("AUTOPILOT_VERIFIER_CMD").filter(|v| !v.trim().is_empty()) {
            self.verifier.command = Some(cmd);
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.loop_settings.max_iterations == 0 {
            warnings.push("loop.max_iterations is 0: the supervisory loop will never dispatch".into());
        }
        if self.retry.max_attempts == 0 {
            warnings.push("retry.max_attempts is 0: executor calls will never run".into());
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            warnings.push(format!(
                "retry.jitter {} is outside 0.0-1.0 and will be clamped",
                self.retry.jitter
            ));
        }
        if self.retry.base_delay_secs > self.retry.max_delay_secs {
            warnings.push(format!(
                "retry.base_delay_secs ({}) exceeds retry.max_delay_secs ({})",
                self.retry.base_delay_secs, self.retry.max_delay_secs
            ));
        }
        if self.locks.ttl_minutes == 0 {
            warnings.push("locks.ttl_minutes is 0: every lock is immediately stale".into());
        }
        if self.evidence.extensions.is_empty() {
            warnings.push("evidence.extensions is empty: any file mentioning a task id counts as evidence".into());
        }
        if self.executor.command.is_none() {
            warnings.push("executor.command is not set: 'autopilot run' cannot dispatch tasks".into());
        }
        if self.verifier.command.is_none() {
            if self.gate.require_verifier {
                warnings.push(
                    "verifier.command is not set and gate.require_verifier is on: tasks without a verification result are rejected"
                        .into(),
                );
            } else {
                warnings.push(
                    "verifier.command is not set: on-the-spot verification is skipped and counts as passed"
                        .into(),
                );
            }
        }

        warnings
    }
}
