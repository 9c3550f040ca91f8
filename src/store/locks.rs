// src/store/locks.rs
//! Per-id async locks
//!
//! Serializes writers of the same record without a store-wide lock. The
//! registry mutex is only held to look up the entry, never across I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 256;

#[derive(Default)]
pub struct IdLocks {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`; released when the guard drops
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock();
            if entries.len() >= PRUNE_THRESHOLD {
                // Only the registry holds these: nobody is waiting
                entries.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(entries.entry(id.to_string()).or_default())
        };
        entry.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

