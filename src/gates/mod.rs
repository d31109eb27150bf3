//! Acceptance gate.
//!
//! The only path by which a task becomes `done`. Signals are evaluated in a
//! fixed order and the first controlling one wins:
//!
//! 1. no evidence: rejected, nothing else consulted
//! 2. verification explicitly failed: rejected, regardless of review
//! 3. verification not run: rerun on the spot; a failed rerun rejects.
//!    Without a verifier the rerun is skipped, or rejects when one is required
//! 4. review text: negative or absent rejects, only positive accepts
//!
//! Every decision is appended to the decision log before it is returned.

use crate::audit::{DecisionLog, DecisionRecord};
use crate::errors::OrchestratorError;
use crate::evidence::ArtifactProbe;
use crate::orchestrator::Verifier;
use crate::registry::TaskRegistry;
use crate::signals::{ReviewParser, ReviewSignal};
use crate::task::TaskStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// What the caller knows about verification before the gate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Passed,
    Failed,
    NotRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    NoEvidence,
    VerificationFailed,
    VerificationFailedOnRerun,
    ReviewRejected,
    NoReviewSignal,
    Accepted,
}

impl GateReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoEvidence => "no_evidence",
            Self::VerificationFailed => "verification_failed",
            Self::VerificationFailedOnRerun => "verification_failed_on_rerun",
            Self::ReviewRejected => "review_rejected",
            Self::NoReviewSignal => "no_review_signal",
            Self::Accepted => "accepted",
        }
    }
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gate decision with every intermediate signal that led to it.
///
/// `None` means the signal was never consulted because an earlier one
/// already decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub task_id: String,
    pub artifact_found: bool,
    pub verification_passed: Option<bool>,
    pub verification_rerun: bool,
    /// Rerun wanted but no verifier was configured.
    #[serde(default)]
    pub verification_skipped: bool,
    pub reviewer_signal: Option<ReviewSignal>,
    pub allowed: bool,
    pub reason: GateReason,
    pub detail: String,
}

impl Decision {
    /// Status the task should move to.
    pub fn target_status(&self) -> TaskStatus {
        if self.allowed {
            TaskStatus::Done
        } else {
            TaskStatus::InProgress
        }
    }
}

pub struct AcceptanceGate {
    probe: ArtifactProbe,
    verifier: Arc<dyn Verifier>,
    log: DecisionLog,
    parser: ReviewParser,
    require_verifier: bool,
}

impl AcceptanceGate {
    pub fn new(probe: ArtifactProbe, verifier: Arc<dyn Verifier>, log: DecisionLog) -> Self {
        Self {
            probe,
            verifier,
            log,
            parser: ReviewParser::default(),
            require_verifier: false,
        }
    }

    /// Trace every review grammar match.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.parser = ReviewParser::new(verbose);
        self
    }

    /// Reject instead of skipping when a rerun is needed and no verifier is configured.
    pub fn with_require_verifier(mut self, require: bool) -> Self {
        self.require_verifier = require;
        self
    }

    pub fn probe(&self) -> &ArtifactProbe {
        &self.probe
    }

    /// Evaluate the gate for `task_id` and record the decision.
    pub async fn decide(
        &self,
        task_id: &str,
        verification: VerificationStatus,
        review: Option<&str>,
    ) -> Result<Decision, OrchestratorError> {
        let decision = self.evaluate(task_id, verification, review).await;
        self.log.append(&DecisionRecord::new(decision.clone()))?;

        info!(
            task_id,
            allowed = decision.allowed,
            reason = %decision.reason,
            "gate decision: {}",
            decision.detail
        );
        Ok(decision)
    }

    /// Evaluate without recording.
    pub async fn evaluate(
        &self,
        task_id: &str,
        verification: VerificationStatus,
        review: Option<&str>,
    ) -> Decision {
        let mut decision = Decision {
            task_id: task_id.to_string(),
            artifact_found: self.probe.has_evidence(task_id),
            verification_passed: None,
            verification_rerun: false,
            verification_skipped: false,
            reviewer_signal: None,
            allowed: false,
            reason: GateReason::NoEvidence,
            detail: String::new(),
        };

        if !decision.artifact_found {
            decision.detail = format!(
                "no evidence for {} under {}",
                task_id,
                self.probe.runs_dir().display()
            );
            return decision;
        }

        match verification {
            VerificationStatus::Failed => {
                decision.verification_passed = Some(false);
                decision.reason = GateReason::VerificationFailed;
                decision.detail = "verification reported failure".to_string();
                return decision;
            }
            VerificationStatus::Passed => decision.verification_passed = Some(true),
            VerificationStatus::NotRun => {
                decision.verification_rerun = true;
                if !self.verifier.is_configured() {
                    if self.require_verifier {
                        decision.verification_passed = Some(false);
                        decision.reason = GateReason::VerificationFailedOnRerun;
                        decision.detail =
                            "no verifier configured and gate.require_verifier is set".to_string();
                        return decision;
                    }
                    warn!(task_id, "no verifier configured, skipping verification rerun");
                    decision.verification_skipped = true;
                }
                let passed = match self.verifier.run_checks().await {
                    Ok(passed) => passed,
                    Err(e) => {
                        warn!(task_id, error = %e, "verification rerun errored");
                        false
                    }
                };
                decision.verification_passed = Some(passed);
                if !passed {
                    decision.reason = GateReason::VerificationFailedOnRerun;
                    decision.detail = "verification rerun failed".to_string();
                    return decision;
                }
            }
        }

        let verdict = self.parser.parse(review.unwrap_or_default());
        decision.reviewer_signal = Some(verdict.signal);
        let matched = verdict
            .deciding_match()
            .map(|m| m.text.clone())
            .unwrap_or_default();

        match verdict.signal {
            ReviewSignal::Negative => {
                decision.reason = GateReason::ReviewRejected;
                decision.detail = format!("review rejected: {matched}");
            }
            ReviewSignal::Absent => {
                decision.reason = GateReason::NoReviewSignal;
                decision.detail = "review has no explicit accept or reject signal".to_string();
            }
            ReviewSignal::Positive => {
                decision.allowed = true;
                decision.reason = GateReason::Accepted;
                decision.detail = format!("accepted: {matched}");
            }
        }
        decision
    }

    /// Persist the decision's status change.
    ///
    /// Returns the status written, or `None` when the task is already `done`
    /// and a rejection would regress it.
    pub fn apply(
        &self,
        registry: &TaskRegistry,
        decision: &Decision,
    ) -> Result<Option<TaskStatus>, OrchestratorError> {
        let target = decision.target_status();
        let applied = registry.update(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == decision.task_id)
                .ok_or_else(|| OrchestratorError::TaskNotFound {
                    id: decision.task_id.clone(),
                })?;
            if task.status.is_terminal() && target != task.status {
                return Ok(None);
            }
            task.status = target;
            Ok(Some(target))
        })?;

        if applied.is_none() {
            warn!(task_id = %decision.task_id, "task already done, gate rejection not applied");
        }
        Ok(applied)
    }
}
