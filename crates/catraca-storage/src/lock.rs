//! Named, self-expiring mutual-exclusion markers.
//!
//! The synchronization job holds the `import` lock while it merges API data,
//! and the access engine checks it before authorizing. A marker older than
//! its timeout counts as abandoned: the check removes it and reports the lock
//! as free, so a crashed holder cannot block admissions for long.
//!
//! `acquire` is check-then-write. Two callers racing inside the same instant
//! can both succeed; the only holders are the scheduled job and its manual
//! trigger.

#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use catraca_core::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lock contract shared by the engine and the synchronization job.
pub trait SyncLock: Send + Sync {
    /// Take the lock. Returns `false`, without side effects, if it is held.
    async fn acquire(&self) -> StorageResult<bool>;

    /// Whether a live marker exists. Stale markers are removed.
    async fn is_locked(&self) -> bool;

    /// Drop the marker. Idempotent; failures are logged.
    async fn release(&self);
}

/// Lock backed by `<dir>/<name>.lock` holding an RFC 3339 timestamp.
#[derive(Debug, Clone)]
pub struct FileLock<K: Clock = SystemClock> {
    path: PathBuf,
    timeout: Duration,
    clock: K,
}

impl FileLock<SystemClock> {
    /// Create a lock named `name` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, name: &str, timeout: Duration) -> Self {
        Self::with_clock(dir, name, timeout, SystemClock)
    }
}

impl<K: Clock> FileLock<K> {
    pub fn with_clock(dir: impl AsRef<Path>, name: &str, timeout: Duration, clock: K) -> Self {
        Self {
            path: dir.as_ref().join(format!("{name}.lock")),
            timeout,
            clock,
        }
    }

    /// Marker file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn read_marker(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable lock marker");
                None
            }
        }
    }

    async fn remove_marker(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove lock marker"),
        }
    }

    fn is_fresh(&self, locked_at: DateTime<Utc>) -> bool {
        let age = self.clock.now().signed_duration_since(locked_at);
        chrono::Duration::from_std(self.timeout).is_ok_and(|timeout| age < timeout)
    }
}

impl<K: Clock> SyncLock for FileLock<K> {
    async fn acquire(&self) -> StorageResult<bool> {
        if self.is_locked().await {
            debug!(path = %self.path.display(), "Lock already held");
            return Ok(false);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Lock(format!("Failed to create lock directory: {e}"))
            })?;
        }

        let now = self.clock.now().to_rfc3339();
        tokio::fs::write(&self.path, now.as_bytes())
            .await
            .map_err(|e| StorageError::Lock(format!("Failed to write lock marker: {e}")))?;

        debug!(path = %self.path.display(), "Lock acquired");
        Ok(true)
    }

    async fn is_locked(&self) -> bool {
        let Some(contents) = self.read_marker().await else {
            return false;
        };

        match DateTime::parse_from_rfc3339(contents.trim()) {
            Ok(locked_at) if self.is_fresh(locked_at.with_timezone(&Utc)) => true,
            Ok(locked_at) => {
                info!(
                    path = %self.path.display(),
                    locked_at = %locked_at,
                    "Releasing abandoned lock"
                );
                self.remove_marker().await;
                false
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt lock marker, removing");
                self.remove_marker().await;
                false
            }
        }
    }

    async fn release(&self) {
        self.remove_marker().await;
        debug!(path = %self.path.display(), "Lock released");
    }
}
