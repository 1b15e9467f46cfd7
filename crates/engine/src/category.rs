//! One registered category: its heap, its cached Top-K snapshot and its
//! payload side table.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use toprank_core::{EntityId, IndexedMaxHeap, Result, ScoredEntity};

/// An immutable, ranked extraction of a category's heap.
#[derive(Debug, Clone)]
struct Snapshot {
    entities: Arc<[ScoredEntity]>,
    /// The extraction drained the whole heap, so it answers any `k`.
    complete: bool,
}

impl Snapshot {
    fn covers(&self, k: usize) -> bool {
        self.complete || self.entities.len() >= k
    }
}

#[derive(Debug, Default)]
pub(crate) struct Category {
    heap: IndexedMaxHeap,
    snapshot: RwLock<Option<Snapshot>>,
    payloads: HashMap<EntityId, serde_json::Value>,
}

impl Category {
    pub fn new(heap: IndexedMaxHeap) -> Self {
        Self {
            heap,
            ..Default::default()
        }
    }

    pub fn heap(&self) -> &IndexedMaxHeap {
        &self.heap
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Apply a heap mutation and drop the cached snapshot if it succeeded.
    pub fn mutate<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut IndexedMaxHeap) -> Result<T>,
    {
        let out = f(&mut self.heap)?;
        *self.snapshot.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(out)
    }

    /// Remove an entity together with its payload.
    pub fn remove(&mut self, id: EntityId) -> Result<ScoredEntity> {
        let removed = self.mutate(|heap| heap.delete(id))?;
        self.payloads.remove(&id);
        Ok(removed)
    }

    /// Ranked extraction of at least `min(k, len)` entities.
    ///
    /// The returned slice may be longer than `k` when a larger cached
    /// snapshot is reused; callers take the prefix they need.
    pub fn snapshot(&self, k: usize, use_cache: bool) -> Arc<[ScoredEntity]> {
        if use_cache {
            let cached = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);

            if let Some(snap) = cached.as_ref().filter(|s| s.covers(k)) {
                return Arc::clone(&snap.entities);
            }
        }

        let entities: Arc<[ScoredEntity]> = self.heap.top_k(k).into();

        if use_cache && k > 0 {
            let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            *slot = Some(Snapshot {
                entities: Arc::clone(&entities),
                complete: k >= self.heap.len(),
            });
        }

        entities
    }

    /// `true` if a cached snapshot already answers a request for `k`.
    pub fn is_warm(&self, k: usize) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| s.covers(k))
    }

    pub fn set_payload(&mut self, id: EntityId, value: serde_json::Value) -> Option<serde_json::Value> {
        self.payloads.insert(id, value)
    }

    pub fn payload(&self, id: EntityId) -> Option<&serde_json::Value> {
        self.payloads.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toprank_core::RankError;

    fn category() -> Category {
        Category::new(
            IndexedMaxHeap::from_entities([
                ScoredEntity::new(1, 4.0, 0),
                ScoredEntity::new(2, 3.0, 0),
                ScoredEntity::new(3, 2.0, 0),
                ScoredEntity::new(4, 1.0, 0),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn snapshot_is_cached_and_reused_for_smaller_k() {
        let c = category();
        assert!(!c.is_warm(2));

        let first = c.snapshot(3, true);
        assert_eq!(first.len(), 3);
        assert!(c.is_warm(2));
        assert!(c.is_warm(3));
        assert!(!c.is_warm(4));

        let again = c.snapshot(2, true);
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn complete_snapshot_covers_any_k() {
        let c = category();
        c.snapshot(100, true);

        assert!(c.is_warm(1_000));
        assert_eq!(c.snapshot(7, true).len(), 4);
    }

    #[test]
    fn mutation_invalidates_snapshot() {
        let mut c = category();
        c.snapshot(2, true);

        c.mutate(|h| h.update_primary(4, 9.0)).unwrap();
        assert!(!c.is_warm(1));

        let fresh = c.snapshot(1, true);
        assert_eq!(fresh[0].id, 4);
    }

    #[test]
    fn failed_mutation_keeps_snapshot() {
        let mut c = category();
        c.snapshot(2, true);

        let err = c.mutate(|h| h.update_primary(99, 1.0)).unwrap_err();
        assert_eq!(err, RankError::NotFound { id: 99 });
        assert!(c.is_warm(2));
    }

    #[test]
    fn uncached_snapshot_leaves_cache_cold() {
        let c = category();
        c.snapshot(2, false);

        assert!(!c.is_warm(1));
    }

    #[test]
    fn remove_drops_payload() {
        let mut c = category();
        c.set_payload(2, serde_json::json!({"name": "West Lake"}));
        assert!(c.payload(2).is_some());

        c.remove(2).unwrap();
        assert!(c.payload(2).is_none());
        assert_eq!(c.len(), 3);
    }
}
