//! Per-record mutual exclusion.
//!
//! Edits and removals of the same record are serialized so that two
//! overlapping requests cannot interleave their store call and local write.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::RecordKind;

/// Async locks keyed by `(kind, id)`, created on demand.
#[derive(Debug, Default)]
pub(crate) struct RecordLocks {
    inner: Mutex<HashMap<(RecordKind, i64), Arc<Mutex<()>>>>,
}

impl RecordLocks {
    /// Waits for exclusive access to one record. Released when the guard drops.
    pub(crate) async fn acquire(&self, kind: RecordKind, id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Drop locks nobody holds or waits on.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry((kind, id)).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}
