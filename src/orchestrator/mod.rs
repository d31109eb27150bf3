//! Collaborators and the supervisory loop that drives them.

pub mod executor;
pub mod reviewer;
pub mod shell;
pub mod supervisor;
pub mod verifier;

pub use executor::{CommandExecutor, ExecutionReport, Executor};
pub use reviewer::{CommandReviewer, ReportReviewer, Reviewer};
pub use supervisor::{
    IterationOutcome, LoopSettings, LoopSummary, ReviewPendingReport, Supervisor, review_pending,
};
pub use verifier::{CommandVerifier, NoVerifier, Verifier};

use crate::audit::DecisionLog;
use crate::config::Config;
use crate::evidence::ArtifactProbe;
use crate::gates::AcceptanceGate;
use crate::locks::LockManager;
use crate::registry::TaskRegistry;
use crate::retry::RetryPolicy;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub fn build_verifier(config: &Config) -> Arc<dyn Verifier> {
    match config.verifier_command() {
        Some(cmd) => {
            let timeout = config.settings().verifier.timeout_secs.map(Duration::from_secs);
            Arc::new(CommandVerifier::new(cmd, &config.project_dir, timeout))
        }
        None => Arc::new(NoVerifier),
    }
}

/// Command reviewer when configured, otherwise the newest review report.
pub fn build_reviewer(config: &Config) -> Arc<dyn Reviewer> {
    match config.reviewer_command() {
        Some(cmd) => {
            let timeout = config.settings().reviewer.timeout_secs.map(Duration::from_secs);
            Arc::new(CommandReviewer::new(cmd, &config.project_dir, timeout))
        }
        None => Arc::new(ReportReviewer::new(
            &config.reviews_dir,
            config.evidence_extensions(),
        )),
    }
}

pub fn build_gate(config: &Config) -> AcceptanceGate {
    AcceptanceGate::new(
        ArtifactProbe::new(&config.runs_dir, config.evidence_extensions()),
        build_verifier(config),
        DecisionLog::new(&config.decision_log),
    )
    .with_verbose(config.verbose)
    .with_require_verifier(config.require_verifier())
}

/// Wire a supervisor from configuration. Requires an executor command.
pub fn build_supervisor(config: &Config) -> Result<Supervisor> {
    let Some(command) = config.executor_command() else {
        anyhow::bail!(
            "No executor configured. Set [executor] command in ops/autopilot.toml or AUTOPILOT_EXECUTOR_CMD."
        );
    };
    let executor = CommandExecutor::new(
        command,
        &config.project_dir,
        &config.log_dir,
        config.executor_timeout(),
    );

    Ok(Supervisor::new(
        TaskRegistry::new(&config.registry_file),
        LockManager::new(&config.locks_dir, config.lock_ttl()),
        build_gate(config),
        Arc::new(executor),
        build_reviewer(config),
        RetryPolicy::from_settings(&config.settings().retry),
        LoopSettings::from_config(config),
    ))
}
