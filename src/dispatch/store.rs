//! Keyed batch storage.
//!
//! The store is injected as an interface so the atomic-update discipline is
//! explicit and testable in isolation instead of hiding behind a
//! process-wide map. The bundled implementation is volatile; losing it on
//! restart is acceptable.

use crate::models::Batch;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Storage contract for batch records.
///
/// `update` is a read-modify-write that must be atomic with respect to a
/// single batch id: the dispatch loop appends per-chunk results while any
/// number of status readers fetch snapshots. A missing id is a normal
/// reportable condition, not an error.
pub trait BatchStore: Send + Sync {
    fn create(&self, batch: Batch);

    /// Snapshot of a batch, if present. Readers never see a half-applied
    /// update.
    fn get(&self, id: &str) -> Option<Batch>;

    /// Apply `mutate` to the batch under the store's lock. Returns false
    /// when the id is absent.
    fn update(&self, id: &str, mutate: &mut dyn FnMut(&mut Batch)) -> bool;

    /// Remove batches created before `cutoff`, returning how many were
    /// dropped.
    fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> usize;
}

/// In-memory store backed by a concurrent map.
#[derive(Clone, Default)]
pub struct InMemoryBatchStore {
    batches: Arc<DashMap<String, Batch>>,
}

impl InMemoryBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl BatchStore for InMemoryBatchStore {
    fn create(&self, batch: Batch) {
        self.batches.insert(batch.id.clone(), batch);
    }

    fn get(&self, id: &str) -> Option<Batch> {
        self.batches.get(id).map(|entry| entry.value().clone())
    }

    fn update(&self, id: &str, mutate: &mut dyn FnMut(&mut Batch)) -> bool {
        match self.batches.get_mut(id) {
            Some(mut entry) => {
                mutate(entry.value_mut());
                true
            }
            None => false,
        }
    }

    fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.batches.retain(|_, batch| {
            if batch.created_at < cutoff {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailOutcome;
    use chrono::Duration;

    #[test]
    fn create_then_get_returns_snapshot() {
        let store = InMemoryBatchStore::new();
        store.create(Batch::new("b-1", 5));

        let snapshot = store.get("b-1").expect("batch present");
        assert_eq!(snapshot.id, "b-1");
        assert_eq!(snapshot.total, 5);
    }

    #[test]
    fn absent_id_is_reported_not_fatal() {
        let store = InMemoryBatchStore::new();
        assert!(store.get("missing").is_none());
        assert!(!store.update("missing", &mut |_| {}));
    }

    #[test]
    fn update_is_visible_to_subsequent_reads() {
        let store = InMemoryBatchStore::new();
        store.create(Batch::new("b-2", 2));

        let updated = store.update("b-2", &mut |batch| {
            batch.record_chunk(vec![EmailOutcome::success("a@example.com", "id-1")]);
        });
        assert!(updated);

        let snapshot = store.get("b-2").expect("batch present");
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.success_count, 1);
    }

    #[test]
    fn snapshots_do_not_track_later_updates() {
        let store = InMemoryBatchStore::new();
        store.create(Batch::new("b-3", 2));

        let before = store.get("b-3").expect("batch present");
        store.update("b-3", &mut |batch| {
            batch.record_chunk(vec![EmailOutcome::failed("a@example.com", "nope")]);
        });

        assert!(before.results.is_empty());
        assert_eq!(store.get("b-3").unwrap().results.len(), 1);
    }

    #[test]
    fn sweep_removes_only_expired_batches() {
        let store = InMemoryBatchStore::new();

        let mut old = Batch::new("old", 1);
        old.created_at = Utc::now() - Duration::hours(48);
        store.create(old);
        store.create(Batch::new("fresh", 1));

        let removed = store.sweep_older_than(Utc::now() - Duration::hours(24));
        assert_eq!(removed, 1);
        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
    }
}
