//! The supervisory loop.
//!
//! One sequential control loop drives every scheduling cycle:
//!
//! 1. sweep stale worker locks
//! 2. reserve the next ready task; when nothing is ready, sweep stuck tasks
//!    and try once more, then optionally gate pending work
//! 3. execute under the owner's lock, retrying transient failures
//! 4. collect review text
//! 5. run the acceptance gate and persist its status change
//! 6. cool down
//!
//! Registry errors stop the loop. Anything else only costs the iteration.

use super::executor::Executor;
use super::reviewer::Reviewer;
use crate::config::Config;
use crate::errors::{ExecutionError, OrchestratorError};
use crate::gates::{AcceptanceGate, Decision, VerificationStatus};
use crate::locks::LockManager;
use crate::recovery::sweep_stuck;
use crate::registry::TaskRegistry;
use crate::retry::RetryPolicy;
use crate::scheduler::Scheduler;
use crate::task::{Task, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Loop bounds and pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub max_iterations: u32,
    pub cooldown: Duration,
    pub lock_ttl: Duration,
    pub review_pending_when_idle: bool,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.max_iterations(),
            cooldown: config.cooldown(),
            lock_ttl: config.lock_ttl(),
            review_pending_when_idle: config.review_pending_when_idle(),
        }
    }
}

/// What a single iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// Nothing was ready, even after recovery
    Idle { swept: Vec<String> },
    /// The task ran and the gate decided
    Gated { task_id: String, decision: Decision },
    /// Execution, review or gating failed; the task keeps its status.
    /// `task_id` is empty when the failure came before reservation.
    Failed { task_id: String, error: String },
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u32,
    pub dispatched: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub idle: u32,
    pub failed: u32,
}

impl LoopSummary {
    fn record(&mut self, outcome: &IterationOutcome) {
        self.iterations += 1;
        match outcome {
            IterationOutcome::Idle { .. } => self.idle += 1,
            IterationOutcome::Gated { decision, .. } => {
                self.dispatched += 1;
                if decision.allowed {
                    self.accepted += 1;
                } else {
                    self.rejected += 1;
                }
            }
            IterationOutcome::Failed { task_id, .. } => {
                if !task_id.is_empty() {
                    self.dispatched += 1;
                }
                self.failed += 1;
            }
        }
    }
}

/// Result of gating every pending task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPendingReport {
    /// In-progress tasks without evidence, reset to `todo`
    pub reset: Vec<String>,
    pub decisions: Vec<Decision>,
    /// Tasks whose review could not be collected, with the error
    pub failed: Vec<(String, String)>,
}

/// Gate every `in_progress` or `review` task that has evidence.
///
/// Evidence-less `in_progress` tasks are reset to `todo` first.
pub async fn review_pending(
    registry: &TaskRegistry,
    gate: &AcceptanceGate,
    reviewer: &dyn Reviewer,
) -> Result<ReviewPendingReport, OrchestratorError> {
    let mut report = ReviewPendingReport {
        reset: sweep_stuck(registry, gate.probe())?,
        ..Default::default()
    };

    let pending: Vec<Task> = registry
        .load()?
        .into_iter()
        .filter(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Review))
        .collect();

    for task in pending {
        let text = match reviewer.review(&task).await {
            Ok(text) => text,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "review failed");
                report.failed.push((task.id.clone(), format!("{e:#}")));
                continue;
            }
        };
        let decision = gate
            .decide(&task.id, VerificationStatus::NotRun, Some(&text))
            .await?;
        gate.apply(registry, &decision)?;
        report.decisions.push(decision);
    }

    Ok(report)
}

pub struct Supervisor {
    registry: TaskRegistry,
    locks: LockManager,
    gate: AcceptanceGate,
    executor: Arc<dyn Executor>,
    reviewer: Arc<dyn Reviewer>,
    retry: RetryPolicy,
    settings: LoopSettings,
}

impl Supervisor {
    pub fn new(
        registry: TaskRegistry,
        locks: LockManager,
        gate: AcceptanceGate,
        executor: Arc<dyn Executor>,
        reviewer: Arc<dyn Reviewer>,
        retry: RetryPolicy,
        settings: LoopSettings,
    ) -> Self {
        Self {
            registry,
            locks,
            gate,
            executor,
            reviewer,
            retry,
            settings,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub async fn run(&self) -> Result<LoopSummary, OrchestratorError> {
        self.run_with(|_, _| {}).await
    }

    /// Run up to `max_iterations` iterations, reporting each outcome.
    ///
    /// Returns early only on a fatal registry error.
    pub async fn run_with<F>(&self, mut on_iteration: F) -> Result<LoopSummary, OrchestratorError>
    where
        F: FnMut(u32, &IterationOutcome),
    {
        let mut summary = LoopSummary::default();
        let max = self.settings.max_iterations;

        for iteration in 1..=max {
            let outcome = match self.run_iteration(iteration).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => {
                    error!(iteration, error = %e, "fatal error, stopping loop");
                    return Err(e);
                }
                Err(e) => {
                    error!(iteration, error = %e, "iteration made no progress");
                    IterationOutcome::Failed {
                        task_id: String::new(),
                        error: e.to_string(),
                    }
                }
            };
            summary.record(&outcome);
            on_iteration(iteration, &outcome);

            if iteration < max && !self.settings.cooldown.is_zero() {
                tokio::time::sleep(self.settings.cooldown).await;
            }
        }

        info!(
            iterations = summary.iterations,
            dispatched = summary.dispatched,
            accepted = summary.accepted,
            rejected = summary.rejected,
            idle = summary.idle,
            failed = summary.failed,
            "loop finished"
        );
        Ok(summary)
    }

    /// One scheduling cycle.
    pub async fn run_iteration(&self, iteration: u32) -> Result<IterationOutcome, OrchestratorError> {
        match self.locks.sweep(self.settings.lock_ttl) {
            Ok(removed) if !removed.is_empty() => {
                info!(iteration, count = removed.len(), "swept stale locks");
            }
            Ok(_) => {}
            Err(e) => warn!(iteration, error = %e, "lock sweep failed"),
        }

        let task = match self.reserve(iteration).await? {
            Reserved::Task(task) => task,
            Reserved::Idle(swept) => return Ok(IterationOutcome::Idle { swept }),
        };

        info!(iteration, task_id = %task.id, owner = %task.owner, "dispatching task");

        if let Err(e) = self.execute(&task).await {
            error!(iteration, task_id = %task.id, error = %e, "execution failed");
            return Ok(IterationOutcome::Failed {
                task_id: task.id,
                error: e.to_string(),
            });
        }

        let review = match self.reviewer.review(&task).await {
            Ok(text) => text,
            Err(e) => {
                error!(iteration, task_id = %task.id, error = %e, "review failed");
                return Ok(IterationOutcome::Failed {
                    task_id: task.id,
                    error: format!("{e:#}"),
                });
            }
        };

        let decision = match self
            .gate
            .decide(&task.id, VerificationStatus::NotRun, Some(&review))
            .await
        {
            Ok(decision) => decision,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(iteration, task_id = %task.id, error = %e, "gate failed");
                return Ok(IterationOutcome::Failed {
                    task_id: task.id,
                    error: e.to_string(),
                });
            }
        };
        self.gate.apply(&self.registry, &decision)?;

        Ok(IterationOutcome::Gated {
            task_id: task.id,
            decision,
        })
    }

    /// Gate every pending task with this supervisor's collaborators.
    pub async fn review_pending(&self) -> Result<ReviewPendingReport, OrchestratorError> {
        review_pending(&self.registry, &self.gate, self.reviewer.as_ref()).await
    }

    async fn reserve(&self, iteration: u32) -> Result<Reserved, OrchestratorError> {
        let scheduler = Scheduler::new(&self.registry);
        if let Some(task) = scheduler.next_ready()? {
            return Ok(Reserved::Task(task));
        }

        let swept = sweep_stuck(&self.registry, self.gate.probe())?;
        if let Some(task) = scheduler.next_ready()? {
            return Ok(Reserved::Task(task));
        }

        if self.settings.review_pending_when_idle {
            let report = self.review_pending().await?;
            if !report.decisions.is_empty() {
                info!(
                    iteration,
                    gated = report.decisions.len(),
                    "gated pending tasks while idle"
                );
            }
        }

        info!(iteration, "nothing ready");
        Ok(Reserved::Idle(swept))
    }

    async fn execute(&self, task: &Task) -> Result<(), ExecutionError> {
        let locks = &self.locks;
        let executor = self.executor.as_ref();
        self.retry
            .run(move |attempt| async move {
                let _guard = locks.acquire(&task.owner).map_err(|e| match e {
                    OrchestratorError::LockHeld { .. } => ExecutionError::Transient(e.to_string()),
                    other => ExecutionError::Terminal(other.to_string()),
                })?;
                if attempt > 1 {
                    info!(task_id = %task.id, attempt, "retrying execution");
                }
                executor.execute(task).await.map(|_| ())
            })
            .await
    }
}

enum Reserved {
    Task(Task),
    Idle(Vec<String>),
}
