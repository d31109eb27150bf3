//! Durable task registry.
//!
//! The registry is a JSON Lines snapshot of every task and the sole source of
//! truth for task status. Reads fail fast on any unparseable line; writes go
//! to a temporary sibling and are renamed into place so readers never observe
//! a half-written snapshot.

use crate::errors::OrchestratorError;
use crate::task::{Task, TaskStatus};
use fs2::FileExt;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct TaskRegistry {
    path: PathBuf,
}

impl TaskRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create an empty registry file. Returns false if one already exists.
    pub fn create_empty(&self) -> Result<bool, OrchestratorError> {
        if self.exists() {
            return Ok(false);
        }
        self.save(&[])?;
        Ok(true)
    }

    /// Read the full snapshot.
    pub fn load(&self) -> Result<Vec<Task>, OrchestratorError> {
        if !self.path.exists() {
            return Err(OrchestratorError::RegistryMissing {
                path: self.path.clone(),
            });
        }
        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;

        let mut tasks = Vec::new();
        let mut seen = HashSet::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let task: Task =
                serde_json::from_str(line).map_err(|source| OrchestratorError::RegistryCorrupt {
                    path: self.path.clone(),
                    line: index + 1,
                    source,
                })?;
            if !seen.insert(task.id.clone()) {
                return Err(OrchestratorError::DuplicateTask {
                    path: self.path.clone(),
                    id: task.id,
                });
            }
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Atomically replace the snapshot.
    pub fn save(&self, tasks: &[Task]) -> Result<(), OrchestratorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut body = String::new();
        for task in tasks {
            let line = serde_json::to_string(task)
                .map_err(|e| anyhow::anyhow!("Failed to serialize task {}: {}", task.id, e))?;
            body.push_str(&line);
            body.push('\n');
        }

        let tmp = self.tmp_path();
        let mut file = File::create(&tmp).map_err(|source| self.io_error(source))?;
        file.write_all(body.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|source| self.io_error(source))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    /// Read, mutate and rewrite the snapshot as one logical operation.
    ///
    /// An advisory exclusive lock on a sidecar file is held for the whole
    /// operation. The snapshot is only rewritten when `f` changed it.
    pub fn update<T, F>(&self, f: F) -> Result<T, OrchestratorError>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<T, OrchestratorError>,
    {
        let _guard = self.lock()?;
        let mut tasks = self.load()?;
        let before = tasks.clone();
        let out = f(&mut tasks)?;
        if tasks != before {
            self.save(&tasks)?;
        }
        Ok(out)
    }

    /// Set a task's status without checking transition legality.
    ///
    /// Returns the previous status.
    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<TaskStatus, OrchestratorError> {
        self.update(|tasks| {
            let task = find_mut(tasks, id)?;
            let previous = task.status;
            task.status = status;
            Ok(previous)
        })
    }

    /// Set a task's status, refusing moves the lifecycle does not allow.
    pub fn transition(&self, id: &str, status: TaskStatus) -> Result<TaskStatus, OrchestratorError> {
        self.update(|tasks| {
            let task = find_mut(tasks, id)?;
            let previous = task.status;
            if !previous.can_transition_to(status) {
                return Err(OrchestratorError::IllegalTransition {
                    id: id.to_string(),
                    from: previous,
                    to: status,
                });
            }
            task.status = status;
            Ok(previous)
        })
    }

    pub fn get(&self, id: &str) -> Result<Task, OrchestratorError> {
        self.load()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| OrchestratorError::TaskNotFound { id: id.to_string() })
    }

    /// Tasks grouped by status, each group ordered by priority.
    pub fn by_status(&self) -> Result<BTreeMap<TaskStatus, Vec<Task>>, OrchestratorError> {
        let mut groups: BTreeMap<TaskStatus, Vec<Task>> = BTreeMap::new();
        for task in self.load()? {
            groups.entry(task.status).or_default().push(task);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|t| t.priority);
        }
        Ok(groups)
    }

    fn lock(&self) -> Result<File, OrchestratorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let lock_path = sidecar(&self.path, "lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| self.io_error(source))?;
        FileExt::lock_exclusive(&file).map_err(|source| self.io_error(source))?;
        Ok(file)
    }

    fn tmp_path(&self) -> PathBuf {
        sidecar(&self.path, "tmp")
    }

    fn io_error(&self, source: std::io::Error) -> OrchestratorError {
        OrchestratorError::RegistryIo {
            path: self.path.clone(),
            source,
        }
    }
}

fn find_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task, OrchestratorError> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| OrchestratorError::TaskNotFound { id: id.to_string() })
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{suffix}"));
    path.with_file_name(name)
}
