//! TTL-bounded worker locks.
//!
//! A lock is a `<owner>.lock` marker in the locks directory holding a small
//! JSON record. Locks are keyed by worker identity, not by task. The manager
//! guarantees liveness: an abandoned lock is always reclaimed once it is older
//! than the TTL. It does not guarantee two workers never race inside the TTL.

use crate::errors::OrchestratorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Contents of a lock marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub owner: String,
    pub acquired_at: DateTime<Utc>,
    #[serde(default)]
    pub pid: u32,
}

impl LockRecord {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            acquired_at: Utc::now(),
            pid: std::process::id(),
        }
    }

    /// Age relative to `now`; records from the future count as fresh.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.acquired_at).to_std().unwrap_or(Duration::ZERO)
    }
}

pub struct LockManager {
    locks_dir: PathBuf,
    ttl: Duration,
}

impl LockManager {
    pub fn new(locks_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            locks_dir: locks_dir.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lock_path(&self, owner: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", sanitize(owner)))
    }

    /// Take the lock for `owner`.
    ///
    /// An expired marker is reclaimed; a live one fails with `LockHeld`.
    /// The returned guard removes the marker when dropped.
    pub fn acquire(&self, owner: &str) -> Result<LockGuard, OrchestratorError> {
        fs::create_dir_all(&self.locks_dir).map_err(|source| self.io_error(&self.locks_dir, source))?;
        let path = self.lock_path(owner);

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let record = LockRecord::new(owner);
                    let body = serde_json::to_string(&record)
                        .map_err(|e| anyhow::anyhow!("Failed to serialize lock record: {e}"))?;
                    file.write_all(body.as_bytes())
                        .map_err(|source| self.io_error(&path, source))?;
                    debug!(owner, path = %path.display(), "acquired lock");
                    return Ok(LockGuard {
                        path,
                        owner: owner.to_string(),
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let age = inspect(&path, Utc::now()).map(|(_, age)| age);
                    if age.is_some_and(|age| age <= self.ttl) {
                        return Err(OrchestratorError::LockHeld {
                            owner: owner.to_string(),
                        });
                    }
                    warn!(owner, "reclaiming expired lock");
                    remove_quietly(&path);
                }
                Err(source) => return Err(self.io_error(&path, source)),
            }
        }

        Err(OrchestratorError::LockHeld {
            owner: owner.to_string(),
        })
    }

    /// Rewrite `acquired_at` for a lock this process already holds.
    pub fn refresh(&self, owner: &str) -> Result<(), OrchestratorError> {
        let path = self.lock_path(owner);
        if !path.exists() {
            return Err(self.io_error(&path, std::io::Error::from(ErrorKind::NotFound)));
        }
        let body = serde_json::to_string(&LockRecord::new(owner))
            .map_err(|e| anyhow::anyhow!("Failed to serialize lock record: {e}"))?;
        fs::write(&path, body).map_err(|source| self.io_error(&path, source))
    }

    /// Remove the lock for `owner`. Returns whether a marker existed.
    pub fn release(&self, owner: &str) -> Result<bool, OrchestratorError> {
        let path = self.lock_path(owner);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(&path, source)),
        }
    }

    /// All current lock markers with their age.
    pub fn list(&self) -> Result<Vec<(String, Duration)>, OrchestratorError> {
        let now = Utc::now();
        let mut out: Vec<(String, Duration)> = self
            .markers()?
            .into_iter()
            .filter_map(|path| inspect(&path, now))
            .collect();
        out.sort();
        Ok(out)
    }

    /// Delete every marker older than `ttl` and return the owners removed.
    ///
    /// A marker vanishing mid-sweep is not an error.
    pub fn sweep(&self, ttl: Duration) -> Result<Vec<String>, OrchestratorError> {
        let now = Utc::now();
        let mut removed = Vec::new();

        for path in self.markers()? {
            let Some((owner, age)) = inspect(&path, now) else {
                continue;
            };
            if age <= ttl {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(owner = %owner, age_secs = age.as_secs(), "removed stale lock");
                    removed.push(owner);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale lock"),
            }
        }

        removed.sort();
        Ok(removed)
    }

    fn markers(&self) -> Result<Vec<PathBuf>, OrchestratorError> {
        if !self.locks_dir.exists() {
            return Ok(Vec::new());
        }
        let pattern = self.locks_dir.join("*.lock");
        let pattern = pattern.to_string_lossy();
        let paths = glob::glob(&pattern)
            .map_err(|e| anyhow::anyhow!("Invalid lock glob pattern: {e}"))?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        Ok(paths)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> OrchestratorError {
        OrchestratorError::LockIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Holds a worker lock; the marker is removed on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    owner: String,
    released: bool,
}

impl LockGuard {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the marker on disk after the guard goes away.
    pub fn persist(mut self) -> PathBuf {
        self.released = true;
        self.path.clone()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            remove_quietly(&self.path);
            debug!(owner = %self.owner, "released lock");
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove lock");
    }
}

/// Owner and age of a marker.
///
/// Both come from the record when it parses; otherwise the owner is the file
/// stem and the age is measured from the mtime. `None` when the marker
/// disappeared.
fn inspect(path: &Path, now: DateTime<Utc>) -> Option<(String, Duration)> {
    if let Ok(content) = fs::read_to_string(path)
        && let Ok(record) = serde_json::from_str::<LockRecord>(&content)
    {
        let age = record.age(now);
        return Some((record.owner, age));
    }
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let modified: DateTime<Utc> = modified.into();
    let owner = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Some((owner, (now - modified).to_std().unwrap_or(Duration::ZERO)))
}

/// Owners become file names; keep them to a safe character set.
fn sanitize(owner: &str) -> String {
    owner
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    const HOUR: Duration = Duration::from_secs(3600);

    fn make_manager() -> (LockManager, TempDir) {
        let dir = tempdir().unwrap();
        let manager = LockManager::new(dir.path().join("locks"), HOUR);
        (manager, dir)
    }

    fn write_record(manager: &LockManager, owner: &str, age: chrono::Duration) {
        fs::create_dir_all(&manager.locks_dir).unwrap();
        let record = LockRecord {
            owner: owner.to_string(),
            acquired_at: Utc::now() - age,
            pid: 1,
        };
        fs::write(manager.lock_path(owner), serde_json::to_string(&record).unwrap()).unwrap();
    }

    #[test]
    fn test_sweep_removes_only_expired_locks() {
        let (manager, _dir) = make_manager();
        write_record(&manager, "AGENT-OLD", chrono::Duration::minutes(90));
        write_record(&manager, "AGENT-NEW", chrono::Duration::minutes(5));

        let removed = manager.sweep(HOUR).unwrap();
        assert_eq!(removed, vec!["AGENT-OLD".to_string()]);
        assert!(!manager.lock_path("AGENT-OLD").exists());
        assert!(manager.lock_path("AGENT-NEW").exists());
    }

    #[test]
    fn test_sweep_on_missing_dir_is_empty() {
        let (manager, _dir) = make_manager();
        assert!(manager.sweep(HOUR).unwrap().is_empty());
    }

    #[test]
    fn test_sweep_falls_back_to_mtime_for_unreadable_markers() {
        let (manager, _dir) = make_manager();
        fs::create_dir_all(&manager.locks_dir).unwrap();
        let path = manager.lock_path("AGENT-RAW");
        fs::write(&path, "not json").unwrap();

        assert!(manager.sweep(HOUR).unwrap().is_empty());

        let two_hours_ago = std::time::SystemTime::now() - 2 * HOUR;
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(two_hours_ago).unwrap();
        drop(file);

        assert_eq!(manager.sweep(HOUR).unwrap(), vec!["AGENT-RAW".to_string()]);
        assert!(!path.exists());
    }

    #[test]
    fn test_acquire_and_drop_releases() {
        let (manager, _dir) = make_manager();
        {
            let guard = manager.acquire("AGENT-1").unwrap();
            assert_eq!(guard.owner(), "AGENT-1");
            assert!(guard.path().exists());
        }
        assert!(!manager.lock_path("AGENT-1").exists());
    }

    #[test]
    fn test_acquire_live_lock_is_held() {
        let (manager, _dir) = make_manager();
        let _guard = manager.acquire("AGENT-1").unwrap();
        let err = manager.acquire("AGENT-1").unwrap_err();
        assert!(matches!(err, OrchestratorError::LockHeld { .. }));
    }

    #[test]
    fn test_acquire_reclaims_expired_lock() {
        let (manager, _dir) = make_manager();
        write_record(&manager, "AGENT-1", chrono::Duration::hours(2));
        let guard = manager.acquire("AGENT-1").unwrap();
        let content = fs::read_to_string(guard.path()).unwrap();
        let record: LockRecord = serde_json::from_str(&content).unwrap();
        assert!(record.age(Utc::now()) < Duration::from_secs(60));
    }

    #[test]
    fn test_persist_keeps_marker_and_release_removes_it() {
        let (manager, _dir) = make_manager();
        let path = manager.acquire("AGENT-1").unwrap().persist();
        assert!(path.exists());
        assert!(manager.release("AGENT-1").unwrap());
        assert!(!manager.release("AGENT-1").unwrap());
    }

    #[test]
    fn test_refresh_resets_age() {
        let (manager, _dir) = make_manager();
        write_record(&manager, "AGENT-1", chrono::Duration::minutes(50));
        manager.refresh("AGENT-1").unwrap();
        let ages = manager.list().unwrap();
        assert_eq!(ages.len(), 1);
        assert!(ages[0].1 < Duration::from_secs(60));
        assert!(manager.refresh("AGENT-2").is_err());
    }

    #[test]
    fn test_owner_is_sanitized_for_file_names() {
        let (manager, _dir) = make_manager();
        assert!(manager.lock_path("team/agent 1").ends_with("team_agent_1.lock"));
    }

    #[test]
    fn test_sweep_and_list_report_recorded_owner() {
        let (manager, _dir) = make_manager();
        write_record(&manager, "team/agent 1", chrono::Duration::minutes(10));

        let listed = manager.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "team/agent 1");

        write_record(&manager, "team/agent 1", chrono::Duration::minutes(90));
        let removed = manager.sweep(HOUR).unwrap();
        assert_eq!(removed, vec!["team/agent 1".to_string()]);
        assert!(!manager.lock_path("team/agent 1").exists());
    }
}
