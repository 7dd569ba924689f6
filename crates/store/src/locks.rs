//! Per-key async locks
//!
//! Gives single-writer-per-key discipline (one client, one settlement)
//! without a global lock across unrelated keys.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    ///
    /// Slots nobody holds or awaits are pruned on each call, so the map
    /// stays bounded by the keys in flight.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut locks = self.locks.lock().await;
            // held guards and queued waiters each own a clone of the slot
            locks.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Number of key slots currently tracked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
