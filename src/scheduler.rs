//! Dependency-aware task selection.
//!
//! The scheduler picks at most one ready task per call: status `todo`, every
//! dependency `done`, lowest priority first, registry order breaking ties.
//! Selection and reservation happen inside one registry update so a task is
//! never handed out without first being marked `in_progress`.

use crate::errors::OrchestratorError;
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskStatus};
use std::collections::HashMap;
use tracing::info;

/// Index of the next ready task in `tasks`, if any.
///
/// A dependency id missing from the snapshot counts as unsatisfied.
pub fn select_ready(tasks: &[Task]) -> Option<usize> {
    let status_by_id: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

    tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.status == TaskStatus::Todo)
        .filter(|(_, t)| unmet_with(t, &status_by_id).is_empty())
        // min_by_key keeps the first of equal keys, preserving registry order
        .min_by_key(|(_, t)| t.priority)
        .map(|(index, _)| index)
}

/// Dependencies of `task` that are not yet `done` in `tasks`.
pub fn unmet_dependencies(task: &Task, tasks: &[Task]) -> Vec<String> {
    let status_by_id: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();
    unmet_with(task, &status_by_id)
}

fn unmet_with(task: &Task, status_by_id: &HashMap<&str, TaskStatus>) -> Vec<String> {
    task.depends_on
        .iter()
        .filter(|dep| status_by_id.get(dep.as_str()) != Some(&TaskStatus::Done))
        .cloned()
        .collect()
}

/// Selects and reserves tasks from a registry.
pub struct Scheduler<'a> {
    registry: &'a TaskRegistry,
}

impl<'a> Scheduler<'a> {
    pub fn new(registry: &'a TaskRegistry) -> Self {
        Self { registry }
    }

    /// Pick the next ready task and reserve it.
    ///
    /// The chosen task is flipped to `in_progress` and the registry saved
    /// before it is returned. `None` means nothing is ready right now.
    pub fn next_ready(&self) -> Result<Option<Task>, OrchestratorError> {
        let reserved = self.registry.update(|tasks| {
            Ok(select_ready(tasks).map(|index| {
                let task = &mut tasks[index];
                task.status = TaskStatus::InProgress;
                task.clone()
            }))
        })?;

        if let Some(ref task) = reserved {
            info!(task_id = %task.id, owner = %task.owner, priority = task.priority, "reserved task");
        }
        Ok(reserved)
    }
}
