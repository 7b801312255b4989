//! Per-request async locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use sakay_core::RequestId;

type Slots = DashMap<RequestId, Arc<Mutex<()>>>;

/// One async mutex per request id, created on first use.
///
/// Holding the guard serializes every read-modify-write of that request.
/// The guard may be held across `.await`; it never blocks other requests.
/// An entry lives only while someone holds or awaits it, so ids that were
/// never stored, or whose requests are finished, leave nothing behind.
#[derive(Debug, Default)]
pub struct LockTable {
    slots: Arc<Slots>,
}

/// Exclusive access to one request. Dropping it releases the lock.
#[derive(Debug)]
pub struct RequestGuard {
    id: RequestId,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<Slots>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only taken under the shard lock, so a count of one
        // means no other task holds or waits for this mutex.
        self.slots
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl LockTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: RequestId) -> RequestGuard {
        let mutex = Arc::clone(self.slots.entry(id).or_default().value());
        let guard = mutex.lock_owned().await;
        RequestGuard {
            id,
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
