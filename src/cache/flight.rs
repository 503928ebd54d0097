//! Per-key single-flight locks.
//!
//! Concurrent misses on one key queue behind an async mutex so the producer
//! runs once; later callers find the stored entry when they get the lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::keys::CacheKey;

type LockMap = DashMap<CacheKey, Arc<Mutex<()>>>;

#[derive(Default)]
pub(crate) struct SingleFlight {
    locks: Arc<LockMap>,
}

/// Held while a producer runs. Dropping it, including when the caller's
/// future is cancelled, unlocks the key and removes the lock once nobody
/// else holds or waits on it.
pub(crate) struct FlightGuard {
    locks: Arc<LockMap>,
    key: CacheKey,
    held: Option<OwnedMutexGuard<()>>,
}

impl SingleFlight {
    pub(crate) async fn acquire(&self, key: &CacheKey) -> FlightGuard {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let held = lock.lock_owned().await;
        FlightGuard {
            locks: Arc::clone(&self.locks),
            key: key.clone(),
            held: Some(held),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
