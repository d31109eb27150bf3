use super::DecisionRecord;
use crate::errors::OrchestratorError;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// JSON Lines decision log. Records are only ever appended.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &DecisionRecord) -> Result<(), OrchestratorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let mut line = serde_json::to_string(record)
            .map_err(|e| anyhow::anyhow!("Failed to serialize decision record: {e}"))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|source| self.io_error(source))
    }

    /// All records in append order. A missing log reads as empty.
    pub fn read_all(&self) -> Result<Vec<DecisionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read decision log {}", self.path.display()))?;
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!(
                        "Failed to parse decision log {} at line {}",
                        self.path.display(),
                        index + 1
                    )
                })
            })
            .collect()
    }

    pub fn for_task(&self, task_id: &str) -> Result<Vec<DecisionRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.decision.task_id == task_id)
            .collect())
    }

    fn io_error(&self, source: std::io::Error) -> OrchestratorError {
        OrchestratorError::DecisionLog {
            path: self.path.clone(),
            source,
        }
    }
}
