//! Single-writer locks per aggregate.
//!
//! Read-modify-write sequences on the same profile, collective goal or
//! completion key run one at a time. Different keys never wait on each other.
//! A key's entry is dropped once no guard or waiter refers to it.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Async mutexes indexed by aggregate key.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Arc<LockTable>,
}

/// Exclusive access to one key. Evicts the key on drop when nobody else waits for it.
pub struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<LockTable>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold a clone of the mutex, so a count of 1 means only the table refers to it
        if self
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1)
            .is_some()
        {
            trace!(key = %self.key, "Aggregate lock evicted");
        }
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: impl Into<String>) -> KeyedGuard {
        let key = key.into();
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        trace!(key = %key, "Acquiring aggregate lock");
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            guard: Some(guard),
            key,
            locks: self.locks.clone(),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub(crate) fn profile_key(profile_id: &str) -> String {
    format!("profile:{}", profile_id)
}

pub(crate) fn collective_key(impact: guardian_core::ImpactType) -> String {
    format!("collective:{}", impact.as_str())
}

pub(crate) fn completion_key(actor_id: &str) -> String {
    format!("completion:{}", actor_id)
}

pub(crate) fn badge_key(actor_id: &str) -> String {
    format!("badges:{}", actor_id)
}
