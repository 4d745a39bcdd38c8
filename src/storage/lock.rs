//! Per-path write locks.
//!
//! A lock is an OS advisory lock (`fs2`) on a marker file, so it is atomic
//! across threads and processes sharing the store root, and the OS drops it
//! when the owning process dies. Markers live outside the working tree
//! (under the repository metadata directory) and are never staged. They are
//! left on disk after release: removing a marker another waiter has already
//! opened would let two writers hold "the same" lock.
//!
//! Contention is retried a bounded number of times with a fixed backoff,
//! then reported as [`StoreError::LockContention`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use fs2::FileExt;

use crate::storage::error::{StoreError, StoreResult};
use crate::storage::paths::{encode_name, RepoPath};

pub const DEFAULT_LOCK_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCK_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shared,
    Exclusive,
}

/// Hands out [`LockGuard`]s for store paths.
#[derive(Debug, Clone)]
pub struct LockManager {
    lock_dir: PathBuf,
    attempts: u32,
    backoff: Duration,
}

impl LockManager {
    pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            lock_dir: lock_dir.into(),
            attempts: DEFAULT_LOCK_ATTEMPTS,
            backoff: DEFAULT_LOCK_BACKOFF,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    fn marker_for(&self, path: &RepoPath) -> StoreResult<PathBuf> {
        Ok(self.lock_dir.join(format!("{}.lock", encode_name(path.as_str())?)))
    }

    /// Lock `path` exclusively, waiting `backoff` between attempts.
    ///
    /// The returned guard releases the lock when dropped.
    pub fn acquire(&self, path: &RepoPath) -> StoreResult<LockGuard> {
        self.lock(path, Mode::Exclusive)
    }

    /// Lock `path` for sharing: any number of shared holders may coexist,
    /// but none alongside an exclusive one.
    pub fn acquire_shared(&self, path: &RepoPath) -> StoreResult<LockGuard> {
        self.lock(path, Mode::Shared)
    }

    fn lock(&self, path: &RepoPath, mode: Mode) -> StoreResult<LockGuard> {
        fs::create_dir_all(&self.lock_dir)?;
        let marker = self.marker_for(path)?;

        for attempt in 1..=self.attempts {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&marker)?;

            // fully qualified: std's inherent `File` locking methods shadow
            // some of these names with different signatures
            let locked = match mode {
                Mode::Exclusive => FileExt::try_lock_exclusive(&file),
                Mode::Shared => FileExt::try_lock_shared(&file),
            };
            match locked {
                Ok(()) => {
                    if mode == Mode::Exclusive {
                        record_owner(&file);
                    }
                    tracing::debug!(path = %path, attempt, ?mode, "lock acquired");
                    return Ok(LockGuard {
                        marker,
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    tracing::warn!(path = %path, attempt, ?mode, "lock busy");
                    if attempt < self.attempts {
                        thread::sleep(self.backoff);
                    }
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }

        Err(StoreError::LockContention {
            path: path.as_path().to_path_buf(),
            attempts: self.attempts,
        })
    }
}

/// owner pid, for humans inspecting a stuck store
fn record_owner(mut file: &File) {
    let _ = file.set_len(0);
    let _ = writeln!(file, "{}", std::process::id());
}

/// A held lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    marker: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    /// Release the lock. Calling this more than once is harmless.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(marker = %self.marker.display(), error = %e, "failed to unlock marker");
                }
            }
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}
