//! Limit persistence.
//!
//! The monitor reads the whole set of limits once per tick while the CLI
//! may be writing a change. Both stores replace their snapshot in one
//! step so a reader always sees either the old or the new set, never a
//! partially written one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use super::{Limit, LimitChange, LimitSet};
use crate::AppId;

/// Errors from reading or writing stored limits.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access limits at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Corrupt limits file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize limits: {0}")]
    Serialize(String),
}

/// Key/value store of per-application budgets.
pub trait LimitStore: Send + Sync {
    /// Returns a consistent snapshot of every configured limit.
    fn get_all_limits(&self) -> Result<LimitSet, StoreError>;

    /// Sets the budget for `app`; zero or less removes its limit.
    fn set_limit(&self, app: &AppId, budget_minutes: i64) -> Result<LimitChange, StoreError>;
}

// ============================================================================
// JSON file store
// ============================================================================

/// Limits persisted as a JSON array of records in a single file.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so concurrent readers in other processes never observe a
/// truncated file. A missing file reads as "no limits".
///
/// Updates hold an exclusive `flock(2)` on a `.lock` sibling for the whole
/// load-modify-save, so concurrent writers in separate processes apply
/// their changes one after the other.
#[derive(Debug)]
pub struct JsonLimitStore {
    path: PathBuf,
}

impl JsonLimitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: &std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }

    fn load(&self) -> Result<LimitSet, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LimitSet::new()),
            Err(e) => return Err(self.io_error(&e)),
        };

        if content.trim().is_empty() {
            return Ok(LimitSet::new());
        }

        let records: Vec<Limit> = serde_json::from_str(&content).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        Ok(LimitSet::from_records(records))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.io_error(&e))
            }
            _ => Ok(()),
        }
    }

    fn save(&self, limits: &LimitSet) -> Result<(), StoreError> {
        self.ensure_parent()?;

        let json = serde_json::to_string_pretty(limits.as_records())
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(format!(".tmp-{}", process::id()));
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(|e| self.io_error(&e))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(&e));
        }

        debug!(path = %self.path.display(), count = limits.len(), "Saved limits");
        Ok(())
    }
}

impl LimitStore for JsonLimitStore {
    fn get_all_limits(&self) -> Result<LimitSet, StoreError> {
        self.load()
    }

    fn set_limit(&self, app: &AppId, budget_minutes: i64) -> Result<LimitChange, StoreError> {
        self.ensure_parent()?;
        let _lock = WriterLock::acquire(&self.lock_path()).map_err(|e| self.io_error(&e))?;

        let mut limits = self.load()?;
        let change = limits.apply(app.clone(), budget_minutes);
        if change != LimitChange::Unchanged {
            self.save(&limits)?;
        }
        Ok(change)
    }
}

/// Exclusive advisory lock, released when the file is closed.
struct WriterLock {
    _file: File,
}

impl WriterLock {
    fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).write(true).open(path)?;
        // SAFETY: flock(2) only operates on the descriptor, which `file` keeps open.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { _file: file })
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Limits held in memory as an immutable snapshot behind a lock.
///
/// Writers build a new set and swap the `Arc`; readers clone the set
/// they observed.
#[derive(Debug, Default)]
pub struct MemoryLimitStore {
    snapshot: RwLock<Arc<LimitSet>>,
}

impl MemoryLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: LimitSet) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(limits)),
        }
    }
}

impl LimitStore for MemoryLimitStore {
    fn get_all_limits(&self) -> Result<LimitSet, StoreError> {
        let snapshot = self.snapshot.read().unwrap_or_else(|p| p.into_inner());
        Ok(LimitSet::clone(&snapshot))
    }

    fn set_limit(&self, app: &AppId, budget_minutes: i64) -> Result<LimitChange, StoreError> {
        let mut snapshot = self.snapshot.write().unwrap_or_else(|p| p.into_inner());
        let mut next = LimitSet::clone(&snapshot);
        let change = next.apply(app.clone(), budget_minutes);
        *snapshot = Arc::new(next);
        Ok(change)
    }
}
