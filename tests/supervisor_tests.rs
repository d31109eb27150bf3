//! Supervisory loop tests against in-process collaborators.

use async_trait::async_trait;
use autopilot::audit::DecisionLog;
use autopilot::errors::{ExecutionError, OrchestratorError};
use autopilot::evidence::ArtifactProbe;
use autopilot::gates::{AcceptanceGate, GateReason};
use autopilot::locks::LockManager;
use autopilot::orchestrator::{
    ExecutionReport, Executor, IterationOutcome, LoopSettings, Reviewer, Supervisor, Verifier,
    review_pending,
};
use autopilot::registry::TaskRegistry;
use autopilot::retry::RetryPolicy;
use autopilot::task::{Task, TaskStatus};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// Fakes
// =============================================================================

struct FakeExecutor {
    runs_dir: PathBuf,
    write_evidence: bool,
    failures: Mutex<VecDeque<ExecutionError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    fn new(runs_dir: PathBuf) -> Self {
        Self {
            runs_dir,
            write_evidence: true,
            failures: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn without_evidence(mut self) -> Self {
        self.write_evidence = false;
        self
    }

    fn failing_with(self, failures: Vec<ExecutionError>) -> Self {
        *self.failures.lock().unwrap() = failures.into();
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, task: &Task) -> Result<ExecutionReport, ExecutionError> {
        self.calls.lock().unwrap().push(task.id.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if self.write_evidence {
            fs::write(
                self.runs_dir.join(format!("{}.md", task.id)),
                format!("ran {}", task.id),
            )
            .unwrap();
        }
        Ok(ExecutionReport::default())
    }
}

struct FakeReviewer(&'static str);

#[async_trait]
impl Reviewer for FakeReviewer {
    async fn review(&self, _task: &Task) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

struct FailingReviewer;

#[async_trait]
impl Reviewer for FailingReviewer {
    async fn review(&self, task: &Task) -> anyhow::Result<String> {
        anyhow::bail!("reviewer exited with status 2 for {}", task.id)
    }
}

struct FakeVerifier(bool);

#[async_trait]
impl Verifier for FakeVerifier {
    async fn run_checks(&self) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    dir: TempDir,
    registry: TaskRegistry,
    executor: Arc<FakeExecutor>,
}

impl Harness {
    fn new(tasks: &[Task]) -> Self {
        Self::with_executor(tasks, FakeExecutor::new)
    }

    fn with_executor(tasks: &[Task], build: impl FnOnce(PathBuf) -> FakeExecutor) -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["ops/locks", "docs/runs"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let registry = TaskRegistry::new(dir.path().join("ops/queue.jsonl"));
        registry.save(tasks).unwrap();
        let executor = Arc::new(build(dir.path().join("docs/runs")));
        Self {
            dir,
            registry,
            executor,
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.dir.path().join("docs/runs")
    }

    fn locks(&self) -> LockManager {
        LockManager::new(self.dir.path().join("ops/locks"), Duration::from_secs(3600))
    }

    fn log(&self) -> DecisionLog {
        DecisionLog::new(self.dir.path().join("ops/gate-decisions.jsonl"))
    }

    fn gate(&self, verifier_passes: bool) -> AcceptanceGate {
        AcceptanceGate::new(
            ArtifactProbe::new(self.runs_dir(), &["md".to_string()]),
            Arc::new(FakeVerifier(verifier_passes)),
            self.log(),
        )
    }

    fn supervisor(&self, review: &'static str, verifier_passes: bool, iterations: u32) -> Supervisor {
        self.supervisor_with(Arc::new(FakeReviewer(review)), verifier_passes, iterations)
    }

    fn supervisor_with(
        &self,
        reviewer: Arc<dyn Reviewer>,
        verifier_passes: bool,
        iterations: u32,
    ) -> Supervisor {
        Supervisor::new(
            TaskRegistry::new(self.registry.path()),
            self.locks(),
            self.gate(verifier_passes),
            self.executor.clone(),
            reviewer,
            RetryPolicy::immediate(3),
            LoopSettings {
                max_iterations: iterations,
                cooldown: Duration::ZERO,
                lock_ttl: Duration::from_secs(3600),
                review_pending_when_idle: true,
            },
        )
    }

    fn status(&self, id: &str) -> TaskStatus {
        self.registry.get(id).unwrap().status
    }
}

const ACCEPT: &str = "<decision>ACCEPT</decision>";

fn task(id: &str, priority: u32, deps: &[&str]) -> Task {
    Task::new(
        id,
        "AGENT-1",
        priority,
        deps.iter().map(|d| d.to_string()).collect(),
    )
}

// =============================================================================
// Dispatch
// =============================================================================

mod dispatch {
    use super::*;

    #[tokio::test]
    async fn test_dependency_chain_runs_in_order() {
        let h = Harness::new(&[
            task("WBS-002", 1, &["WBS-001"]),
            task("WBS-001", 2, &[]),
        ]);
        let summary = h.supervisor(ACCEPT, true, 3).run().await.unwrap();

        assert_eq!(h.executor.calls(), vec!["WBS-001", "WBS-002"]);
        assert_eq!(h.status("WBS-001"), TaskStatus::Done);
        assert_eq!(h.status("WBS-002"), TaskStatus::Done);
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.idle, 1);
    }

    #[tokio::test]
    async fn test_every_gate_decision_is_logged() {
        let h = Harness::new(&[task("WBS-001", 1, &[]), task("WBS-002", 2, &[])]);
        h.supervisor(ACCEPT, true, 2).run().await.unwrap();

        let records = h.log().read_all().unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.decision.task_id.as_str()).collect();
        assert_eq!(ids, vec!["WBS-001", "WBS-002"]);
        assert!(records.iter().all(|r| r.decision.allowed));
    }

    #[tokio::test]
    async fn test_outcomes_are_reported_per_iteration() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        let mut seen = Vec::new();
        h.supervisor(ACCEPT, true, 2)
            .run_with(|iteration, outcome| seen.push((iteration, outcome.clone())))
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0].1, IterationOutcome::Gated { task_id, .. } if task_id == "WBS-001"));
        assert!(matches!(&seen[1].1, IterationOutcome::Idle { .. }));
    }

    #[tokio::test]
    async fn test_stale_lock_is_swept_before_dispatch() {
        let h = Harness::new(&[]);
        let stale = h.dir.path().join("ops/locks/AGENT-9.lock");
        let old = chrono::Utc::now() - chrono::Duration::hours(3);
        fs::write(
            &stale,
            serde_json::json!({ "owner": "AGENT-9", "acquired_at": old, "pid": 1 }).to_string(),
        )
        .unwrap();

        h.supervisor(ACCEPT, true, 1).run().await.unwrap();
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_lock_is_released_after_execution() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        h.supervisor(ACCEPT, true, 1).run().await.unwrap();
        assert!(h.locks().list().unwrap().is_empty());
    }
}

// =============================================================================
// Failures
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let h = Harness::with_executor(&[task("WBS-001", 1, &[])], |runs| {
            FakeExecutor::new(runs)
                .failing_with(vec![ExecutionError::Transient("ConnectError".into())])
        });
        let summary = h.supervisor(ACCEPT, true, 1).run().await.unwrap();

        assert_eq!(h.executor.calls().len(), 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(h.status("WBS-001"), TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_terminal_failure_costs_only_the_iteration() {
        let h = Harness::with_executor(&[task("WBS-001", 1, &[])], |runs| {
            FakeExecutor::new(runs).failing_with(vec![ExecutionError::Terminal("panic".into())])
        });
        let mut outcomes = Vec::new();
        let summary = h
            .supervisor(ACCEPT, true, 1)
            .run_with(|_, outcome| outcomes.push(outcome.clone()))
            .await
            .unwrap();

        assert_eq!(h.executor.calls().len(), 1);
        assert_eq!(summary.failed, 1);
        assert!(matches!(&outcomes[0], IterationOutcome::Failed { task_id, .. } if task_id == "WBS-001"));
        assert_eq!(h.status("WBS-001"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_held_lock_blocks_execution() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        let locks = h.locks();
        let _held = locks.acquire("AGENT-1").unwrap();

        let summary = h.supervisor(ACCEPT, true, 1).run().await.unwrap();
        assert!(h.executor.calls().is_empty());
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_failed_task_is_recovered_and_redispatched() {
        let h = Harness::with_executor(&[task("WBS-001", 1, &[])], |runs| {
            FakeExecutor::new(runs).failing_with(vec![ExecutionError::Terminal("crash".into())])
        });
        let summary = h.supervisor(ACCEPT, true, 2).run().await.unwrap();

        assert_eq!(h.executor.calls(), vec!["WBS-001", "WBS-001"]);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(h.status("WBS-001"), TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_reviewer_failure_costs_only_the_iteration() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        let mut outcomes = Vec::new();
        let summary = h
            .supervisor_with(Arc::new(FailingReviewer), true, 2)
            .run_with(|_, outcome| outcomes.push(outcome.clone()))
            .await
            .unwrap();

        assert_eq!(summary.iterations, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.idle, 1);
        assert!(matches!(
            &outcomes[0],
            IterationOutcome::Failed { task_id, error }
                if task_id == "WBS-001" && error.contains("status 2")
        ));
        assert!(matches!(&outcomes[1], IterationOutcome::Idle { .. }));
        assert_eq!(h.executor.calls(), vec!["WBS-001"]);
        assert_eq!(h.status("WBS-001"), TaskStatus::InProgress);
        assert!(h.log().read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_pending_reports_reviewer_failure() {
        let h = Harness::new(&[task("WBS-001", 1, &[]).with_status(TaskStatus::InProgress)]);
        fs::write(h.runs_dir().join("WBS-001.md"), "ran WBS-001").unwrap();

        let report = review_pending(&h.registry, &h.gate(true), &FailingReviewer)
            .await
            .unwrap();

        assert!(report.reset.is_empty());
        assert!(report.decisions.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "WBS-001");
        assert!(report.failed[0].1.contains("status 2"));
        assert_eq!(h.status("WBS-001"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_corrupt_registry_stops_the_loop() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        fs::write(h.registry.path(), "{broken\n").unwrap();

        let err = h.supervisor(ACCEPT, true, 5).run().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::RegistryCorrupt { line: 1, .. }));
        assert!(err.is_fatal());
    }
}

// =============================================================================
// Gating
// =============================================================================

mod gating {
    use super::*;

    #[tokio::test]
    async fn test_no_evidence_rejects_despite_acceptance() {
        let h = Harness::with_executor(&[task("WBS-001", 1, &[])], |runs| {
            FakeExecutor::new(runs).without_evidence()
        });
        let mut outcomes = Vec::new();
        h.supervisor(ACCEPT, true, 1)
            .run_with(|_, outcome| outcomes.push(outcome.clone()))
            .await
            .unwrap();

        let IterationOutcome::Gated { decision, .. } = &outcomes[0] else {
            panic!("expected a gate decision, got {:?}", outcomes[0]);
        };
        assert!(!decision.allowed);
        assert_eq!(decision.reason, GateReason::NoEvidence);
        assert_eq!(h.status("WBS-001"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_verifier_failure_rejects() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        h.supervisor(ACCEPT, false, 1).run().await.unwrap();

        let records = h.log().for_task("WBS-001").unwrap();
        assert_eq!(records[0].decision.reason, GateReason::VerificationFailedOnRerun);
        assert_eq!(h.status("WBS-001"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_negative_review_rejects() {
        let h = Harness::new(&[task("WBS-001", 1, &[])]);
        h.supervisor("Decision: accept\n\nDo not mark WBS-001 as done.", true, 1)
            .run()
            .await
            .unwrap();

        let records = h.log().for_task("WBS-001").unwrap();
        assert_eq!(records[0].decision.reason, GateReason::ReviewRejected);
        assert_eq!(h.status("WBS-001"), TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_idle_loop_gates_pending_work() {
        let h = Harness::new(&[
            task("WBS-001", 1, &[]).with_status(TaskStatus::InProgress),
            task("WBS-002", 2, &[]).with_status(TaskStatus::Done),
        ]);
        fs::write(h.runs_dir().join("report.md"), "finished WBS-001").unwrap();

        let summary = h.supervisor(ACCEPT, true, 1).run().await.unwrap();
        assert_eq!(summary.idle, 1);
        assert!(h.executor.calls().is_empty());
        assert_eq!(h.status("WBS-001"), TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_done_task_is_never_regressed() {
        let h = Harness::new(&[task("WBS-001", 1, &[]).with_status(TaskStatus::Done)]);
        h.supervisor("REJECTED", true, 2).run().await.unwrap();
        assert_eq!(h.status("WBS-001"), TaskStatus::Done);
        assert!(h.executor.calls().is_empty());
    }
}
