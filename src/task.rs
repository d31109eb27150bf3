//! Task definition and status state machine.
//!
//! This module provides:
//! - `Task` struct representing a single unit of work in the registry
//! - `TaskStatus` with the legal lifecycle transitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of a task.
///
/// `todo` is the only initial state and `done` the only terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Partial,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Partial,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Partial => "partial",
            TaskStatus::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// Check whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// Setting a status to itself is always allowed. Nothing leaves `done`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::{Done, InProgress, Partial, Review, Todo};

        if *self == next {
            return true;
        }
        match self {
            Todo => next == InProgress,
            InProgress => matches!(next, Done | Partial | Todo | Review),
            Review => matches!(next, Done | Todo | InProgress),
            Partial => matches!(next, InProgress | Todo | Done),
            Done => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "partial" => Ok(TaskStatus::Partial),
            "done" => Ok(TaskStatus::Done),
            _ => anyhow::bail!(
                "Invalid status '{}'. Valid values: todo, in_progress, review, partial, done",
                s
            ),
        }
    }
}

fn default_priority() -> u32 {
    9999
}

/// A single unit of work tracked by the registry.
///
/// Only scheduling fields are typed. Descriptive fields (title, phase,
/// acceptance criteria) live in `extra` with every other key, so a null or
/// oddly typed value loads fine and is written back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Stable identifier (e.g. "WBS-001")
    #[serde(rename = "task_id")]
    pub id: String,
    /// Worker class responsible for executing the task
    #[serde(rename = "agent", alias = "owner")]
    pub owner: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Lower runs earlier
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a new `todo` task.
    pub fn new(id: &str, owner: &str, priority: u32, depends_on: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            status: TaskStatus::Todo,
            depends_on,
            priority,
            created_at: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.extra
            .insert("title".to_string(), Value::String(title.to_string()));
        self
    }

    /// Title, when present as a non-empty string.
    pub fn title(&self) -> Option<&str> {
        self.descriptive("title")
    }

    pub fn phase(&self) -> Option<&str> {
        self.descriptive("phase")
    }

    /// Acceptance criteria, whether stored as a list or a single string.
    pub fn acceptance_criteria(&self) -> Vec<&str> {
        match self.extra.get("acceptance_criteria") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    fn descriptive(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
