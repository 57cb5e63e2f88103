//! Per-key mutual exclusion for read-decide-write sequences.
//!
//! The coordinator maps an exam-scoped key to an async mutex. Waiters on the
//! same key are served in FIFO order (`tokio::sync::Mutex` is fair). A key's
//! entry is dropped from the registry as soon as it has neither a holder nor
//! a waiter, so the registry only grows with live contention.
//!
//! The coordinator is an ordinary value. Share it through an `Arc` between
//! every component that mutates per-exam state; it is not a global.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::ReconcileError;

#[derive(Debug, Default)]
pub struct ExclusiveWriteCoordinator {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    wait_timeout: Option<Duration>,
}

impl ExclusiveWriteCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound how long `run_exclusive` waits for a key before giving up with
    /// `ReconcileError::ConcurrencyTimeout`.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// The lock is released on every exit path, including an error returned
    /// by `f` or a panic unwinding through it; the error is passed through
    /// to the caller unchanged.
    pub async fn run_exclusive<F, Fut, T, E>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ReconcileError>,
    {
        let mut lease = KeyLease {
            coordinator: self,
            key: key.to_string(),
            lock: self.lock_for(key),
            guard: None,
        };
        lease.acquire().await?;
        tracing::trace!(key, "exclusive section entered");
        f().await
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.registry().len()
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.registry();
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Forget `key` if nobody but the departing lease holds or awaits it.
    fn prune(&self, key: &str, departing: &Arc<AsyncMutex<()>>) {
        let mut locks = self.registry();
        if let Some(lock) = locks.get(key) {
            // One reference in the registry, one in the departing lease.
            if Arc::ptr_eq(lock, departing) && Arc::strong_count(lock) == 2 {
                locks.remove(key);
            }
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A caller's claim on one key, from first wait until release.
struct KeyLease<'a> {
    coordinator: &'a ExclusiveWriteCoordinator,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLease<'_> {
    async fn acquire(&mut self) -> Result<(), ReconcileError> {
        let lock = Arc::clone(&self.lock);
        let started = Instant::now();
        let guard = match self.coordinator.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    tracing::warn!(key = %self.key, "gave up waiting for exclusive access");
                    ReconcileError::ConcurrencyTimeout {
                        key: self.key.clone(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    }
                })?,
            None => lock.lock_owned().await,
        };
        self.guard = Some(guard);
        Ok(())
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        // The guard owns a reference too; release it before pruning.
        self.guard.take();
        self.coordinator.prune(&self.key, &self.lock);
    }
}
