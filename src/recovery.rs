//! Recovery sweep for executors that crashed without producing anything.

use crate::errors::OrchestratorError;
use crate::evidence::ArtifactProbe;
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskStatus};
use tracing::info;

/// Ids of `in_progress` tasks with no evidence.
pub fn find_stuck(tasks: &[Task], probe: &ArtifactProbe) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .filter(|t| !probe.has_evidence(&t.id))
        .map(|t| t.id.clone())
        .collect()
}

/// Demote every stuck task back to `todo` and return the ids swept.
///
/// Running it twice with no change in between sweeps nothing the second time.
pub fn sweep_stuck(
    registry: &TaskRegistry,
    probe: &ArtifactProbe,
) -> Result<Vec<String>, OrchestratorError> {
    let swept = registry.update(|tasks| {
        let stuck = find_stuck(tasks, probe);
        for task in tasks.iter_mut().filter(|t| stuck.contains(&t.id)) {
            task.status = TaskStatus::Todo;
        }
        Ok(stuck)
    })?;

    for id in &swept {
        info!(task_id = %id, "reset stuck task to todo");
    }
    Ok(swept)
}
