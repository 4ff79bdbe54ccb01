// ABOUTME: Per-environment deploy lock preventing concurrent promotions.
// ABOUTME: In-process flag plus an optional fs2 lock file recording the holder as JSON.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::EnvironmentName;

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Environment being deployed.
    pub environment: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(environment: &EnvironmentName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            environment: environment.to_string(),
        }
    }

    /// Path to the lock file for an environment under a state directory.
    pub fn lock_path(state_dir: &Path, environment: &EnvironmentName) -> PathBuf {
        state_dir.join("locks").join(format!("{}.lock", environment))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Someone else is deploying. `holder` is known unless the lock file was unreadable.
    #[error("environment {environment} is locked")]
    Held {
        environment: String,
        holder: Option<LockInfo>,
    },

    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Binary, non-reentrant lock owned by one environment.
///
/// Acquisition never waits. The in-process flag serializes tasks sharing
/// this value; the lock file, when configured, excludes other processes.
/// The OS drops the file lock if the holder dies, so there are no stale
/// locks to break.
#[derive(Debug, Clone)]
pub struct EnvironmentLock {
    environment: EnvironmentName,
    path: Option<PathBuf>,
    held: Arc<AtomicBool>,
    current: Arc<Mutex<Option<LockInfo>>>,
}

impl EnvironmentLock {
    /// A lock that only excludes tasks within this process.
    pub fn in_process(environment: EnvironmentName) -> Self {
        Self {
            environment,
            path: None,
            held: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// A lock that also takes an exclusive lock on `path`.
    pub fn with_file(environment: EnvironmentName, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_process(environment)
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Who holds the lock right now, as far as this process can tell.
    pub fn holder(&self) -> Option<LockInfo> {
        if let Some(info) = self.current.lock().clone() {
            return Some(info);
        }
        self.path.as_deref().and_then(read_holder)
    }

    /// Take the lock or fail immediately with `LockError::Held`.
    pub fn try_acquire(&self) -> Result<LockGuard, LockError> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(self.held_error(self.current.lock().clone()));
        }

        let info = LockInfo::new(&self.environment);
        let file = match &self.path {
            Some(path) => match self.lock_file(path, &info) {
                Ok(file) => Some(file),
                Err(e) => {
                    self.held.store(false, Ordering::Release);
                    return Err(e);
                }
            },
            None => None,
        };

        tracing::debug!("Acquired deploy lock for {}", self.environment);
        *self.current.lock() = Some(info);
        Ok(LockGuard {
            environment: self.environment.clone(),
            held: Arc::clone(&self.held),
            current: Arc::clone(&self.current),
            file,
        })
    }

    /// Run `f` while holding the lock. The lock is released when `f`
    /// completes or the returned future is dropped.
    pub async fn with_lock<F, Fut, T>(&self, f: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.try_acquire()?;
        Ok(f().await)
    }

    fn lock_file(&self, path: &Path, info: &LockInfo) -> Result<File, LockError> {
        let io_err = |source: std::io::Error| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(self.held_error(read_holder(path)));
            }
            return Err(io_err(e));
        }

        let json = serde_json::to_vec(info).map_err(|e| io_err(e.into()))?;
        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;
        Ok(file)
    }

    fn held_error(&self, holder: Option<LockInfo>) -> LockError {
        LockError::Held {
            environment: self.environment.to_string(),
            holder,
        }
    }
}

fn read_holder(path: &Path) -> Option<LockInfo> {
    let mut contents = String::new();
    File::open(path).ok()?.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

/// A held deploy lock that releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    environment: EnvironmentName,
    held: Arc<AtomicBool>,
    current: Arc<Mutex<Option<LockInfo>>>,
    file: Option<File>,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("environment", &self.environment)
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.set_len(0);
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!("Failed to unlock {} lock file: {}", self.environment, e);
            }
        }
        *self.current.lock() = None;
        self.held.store(false, Ordering::Release);
        tracing::debug!("Released deploy lock for {}", self.environment);
    }
}
