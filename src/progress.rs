//! Markdown progress reports generated from the registry.
//!
//! Two files are produced:
//! - `docs/PROGRESS.md`: every task grouped by status
//! - `docs/TODO_MASTER.md`: the open `todo` work grouped by phase
//!
//! Both are regenerated wholesale and never read back.

use crate::registry::TaskRegistry;
use crate::task::{Task, TaskStatus};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Section order in the progress report.
const PROGRESS_ORDER: [TaskStatus; 5] = [
    TaskStatus::Done,
    TaskStatus::InProgress,
    TaskStatus::Review,
    TaskStatus::Partial,
    TaskStatus::Todo,
];

/// Render the status report for a grouped registry snapshot.
pub fn render_progress(groups: &BTreeMap<TaskStatus, Vec<Task>>) -> String {
    let mut text = String::from("# Progress\n\n");

    for status in PROGRESS_ORDER {
        text.push_str(&format!("## {}\n", status.as_str()));
        let mut tasks: Vec<&Task> = groups
            .get(&status)
            .map(|g| g.iter().collect())
            .unwrap_or_default();
        if tasks.is_empty() {
            text.push_str("- (none)\n");
        }
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        for task in tasks {
            let deps = if task.depends_on.is_empty() {
                "(none)".to_string()
            } else {
                task.depends_on.join(",")
            };
            text.push_str(&format!(
                "- **{}** [{}] deps: {} - {}\n",
                task.id,
                task.owner,
                deps,
                task.title().unwrap_or_default()
            ));
        }
        text.push('\n');
    }
    text
}

/// Render the to-do list: `todo` tasks ordered by phase, owner and priority.
pub fn render_todo(tasks: &[Task]) -> String {
    let mut text = String::from("# Orchestrator To-Do List\n\n");
    text.push_str("_This file is generated from the task registry. Do not edit manually._\n");

    let mut open: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Todo)
        .collect();
    open.sort_by(|a, b| {
        (a.phase().unwrap_or_default(), &a.owner, a.priority).cmp(&(
            b.phase().unwrap_or_default(),
            &b.owner,
            b.priority,
        ))
    });

    let mut current: Option<&str> = None;
    for task in open {
        let phase = task.phase().unwrap_or("Unspecified");
        if current != Some(phase) {
            text.push_str(&format!("\n## Phase: {phase}\n\n"));
            current = Some(phase);
        }
        text.push_str(&format!(
            "- [ ] `{}` **({})** - {} (priority {})\n",
            task.id,
            task.owner,
            task.title().unwrap_or("(no title)"),
            task.priority
        ));
    }
    text
}

/// Paths written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub progress: PathBuf,
    pub todo: PathBuf,
}

/// Regenerate both reports from the registry.
pub fn write_reports(registry: &TaskRegistry, progress: &Path, todo: &Path) -> Result<ReportPaths> {
    let groups = registry.by_status()?;
    let tasks: Vec<Task> = groups.values().flatten().cloned().collect();

    write_file(progress, &render_progress(&groups))?;
    write_file(todo, &render_todo(&tasks))?;
    info!(
        progress = %progress.display(),
        todo = %todo.display(),
        tasks = tasks.len(),
        "wrote progress reports"
    );

    Ok(ReportPaths {
        progress: progress.to_path_buf(),
        todo: todo.to_path_buf(),
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}
