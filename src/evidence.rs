//! Artifact probe.
//!
//! Answers one question: did a task produce *anything*? A file under the runs
//! directory counts as evidence when its name or content contains the task id
//! as a plain substring. Whether that output is any good is the gate's job.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ArtifactProbe {
    runs_dir: PathBuf,
    extensions: Vec<String>,
}

impl ArtifactProbe {
    pub fn new(runs_dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    pub fn has_evidence(&self, task_id: &str) -> bool {
        !task_id.is_empty() && self.candidates().any(|path| mentions(&path, task_id))
    }

    /// Every matching report, newest first.
    pub fn reports_for(&self, task_id: &str) -> Vec<PathBuf> {
        if task_id.is_empty() {
            return Vec::new();
        }
        newest_first(self.candidates().filter(|path| mentions(path, task_id)))
    }

    fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.runs_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| self.accepts_extension(path))
    }

    fn accepts_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// Whether the file name or content of `path` contains `needle`.
pub(crate) fn mentions(path: &Path, needle: &str) -> bool {
    let name_match = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().contains(needle));
    if name_match {
        return true;
    }
    // Unreadable or non-UTF-8 files simply do not match.
    fs::read_to_string(path).is_ok_and(|content| content.contains(needle))
}

/// Sort paths by modification time, newest first; ties by path.
pub(crate) fn newest_first(paths: impl Iterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut stamped: Vec<(SystemTime, PathBuf)> = paths
        .map(|p| {
            let modified = fs::metadata(&p)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .collect();
    stamped.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    stamped.into_iter().map(|(_, p)| p).collect()
}
