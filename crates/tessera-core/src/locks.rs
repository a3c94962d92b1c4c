//! Per-identity serialization.
//!
//! Each party acts as a single logical actor per counterpart identity:
//! operations touching one identity's links or credentials run one at a time,
//! while different identities proceed concurrently.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutexes keyed by identity.
#[derive(Default)]
pub struct IdentityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `identity`.
    ///
    /// The map entry is released before awaiting, so waiting on one identity
    /// never blocks the shard for another.
    pub async fn lock(&self, identity: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Number of identities that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
