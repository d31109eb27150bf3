//! Typed error hierarchy for the autopilot orchestrator.
//!
//! Two top-level enums cover the two failure domains:
//! - `OrchestratorError`: registry, lock and decision-log failures raised by the core
//! - `ExecutionError`: failures reported by an external executor, split into
//!   transient (retryable) and terminal

use crate::task::TaskStatus;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors from the orchestrator core.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Task registry not found at {path}. Run 'autopilot init' first.")]
    RegistryMissing { path: PathBuf },

    #[error("Task registry {path} is corrupt at line {line}: {source}")]
    RegistryCorrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task registry I/O failed at {path}: {source}")]
    RegistryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task registry {path} lists task {id} more than once")]
    DuplicateTask { path: PathBuf, id: String },

    #[error("Task {id} not found in registry")]
    TaskNotFound { id: String },

    #[error("Task {id} cannot move from {from} to {to}")]
    IllegalTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Lock for owner {owner} is held and has not expired")]
    LockHeld { owner: String },

    #[error("Lock I/O failed at {path}: {source}")]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append to decision log {path}: {source}")]
    DecisionLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Whether the supervisory loop must stop rather than skip the iteration.
    ///
    /// Registry errors are fatal: scheduling against an unknown or partial
    /// snapshot is never acceptable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RegistryMissing { .. }
                | Self::RegistryCorrupt { .. }
                | Self::RegistryIo { .. }
                | Self::DuplicateTask { .. }
        )
    }
}

/// Failure reported by an executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("transient execution failure: {0}")]
    Transient(String),

    #[error("terminal execution failure: {0}")]
    Terminal(String),
}

impl ExecutionError {
    /// Build an error from raw failure output, classifying it by signature.
    pub fn from_output(output: &str) -> Self {
        let message = summarize(output);
        if is_transient_failure(output) {
            Self::Transient(message)
        } else {
            Self::Terminal(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

static TRANSIENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)connecterror|connection (?:reset|refused|aborted)|protocol_error|timed out|timeout|temporarily unavailable|rate limit|\b(?:429|502|503|504)\b",
    )
    .expect("transient signature regex is valid")
});

/// Check whether failure output matches a known retryable signature.
pub fn is_transient_failure(output: &str) -> bool {
    TRANSIENT_REGEX.is_match(output)
}

/// Keep the tail of a failure output; the last lines usually carry the cause.
fn summarize(output: &str) -> String {
    let lines: Vec<&str> = output.trim().lines().collect();
    let start = lines.len().saturating_sub(5);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "no output".to_string()
    } else {
        tail
    }
}
