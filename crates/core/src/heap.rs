//! Indexed binary max-heap keyed by entity id.
//!
//! Backing array plus an id → slot map kept in lockstep with every swap, so
//! updates and deletes by id are O(log n). Top-K extraction never touches the
//! live array: it pops from a private copy.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entity::{EntityId, ScoredEntity, checked_score, composite_cmp};
use crate::error::{RankError, Result};

// ---------------------------------------------------------------------------
// Invariant violations
// ---------------------------------------------------------------------------

/// A broken heap invariant, as reported by [`IndexedMaxHeap::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HeapViolation {
    #[error("slot {child} outranks its parent slot {parent}")]
    Order { parent: usize, child: usize },

    #[error("index map holds {indexed} ids for {slots} slots")]
    IndexSize { indexed: usize, slots: usize },

    #[error("id {id} maps to slot {slot}, which holds {found:?}")]
    IndexMismatch {
        id: EntityId,
        slot: usize,
        found: Option<EntityId>,
    },
}

// ---------------------------------------------------------------------------
// IndexedMaxHeap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct IndexedMaxHeap {
    slots: Vec<ScoredEntity>,
    index: HashMap<EntityId, usize>,
}

impl IndexedMaxHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Build a heap from an initial entity set.
    ///
    /// Fails on the first duplicate id or non-finite score; nothing is kept
    /// in that case.
    pub fn from_entities<I>(entities: I) -> Result<Self>
    where
        I: IntoIterator<Item = ScoredEntity>,
    {
        let iter = entities.into_iter();
        let mut heap = Self::with_capacity(iter.size_hint().0);

        for entity in iter {
            heap.insert_entity(entity)?;
        }

        Ok(heap)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&ScoredEntity> {
        self.index.get(&id).map(|&slot| &self.slots[slot])
    }

    /// The current best entity, if any.
    pub fn peek(&self) -> Option<&ScoredEntity> {
        self.slots.first()
    }

    /// All entities in array order (not ranked).
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredEntity> {
        self.slots.iter()
    }

    /// Owned copy of every entity, unranked. Cheaper than `top_k(len)` when
    /// order does not matter.
    pub fn entities(&self) -> Vec<ScoredEntity> {
        self.slots.clone()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    pub fn insert(&mut self, id: EntityId, primary: f64, secondary: u64) -> Result<()> {
        self.insert_entity(ScoredEntity::new(id, primary, secondary))
    }

    pub fn insert_entity(&mut self, mut entity: ScoredEntity) -> Result<()> {
        if self.index.contains_key(&entity.id) {
            return Err(RankError::DuplicateKey { id: entity.id });
        }
        entity.primary_score = checked_score(entity.primary_score)?;

        let slot = self.slots.len();
        self.slots.push(entity);
        self.index.insert(entity.id, slot);
        self.sift_up(slot);

        Ok(())
    }

    pub fn update_primary(&mut self, id: EntityId, value: f64) -> Result<()> {
        let value = checked_score(value)?;
        let slot = self.slot_of(id)?;

        self.slots[slot].primary_score = value;
        self.restore(slot);

        Ok(())
    }

    pub fn update_secondary(&mut self, id: EntityId, value: u64) -> Result<()> {
        let slot = self.slot_of(id)?;

        self.slots[slot].secondary_score = value;
        self.restore(slot);

        Ok(())
    }

    /// Add `delta` to the primary score. Returns the new score.
    pub fn add_primary(&mut self, id: EntityId, delta: f64) -> Result<f64> {
        let current = self.get(id).ok_or(RankError::NotFound { id })?.primary_score;
        let value = checked_score(current + delta)?;

        self.update_primary(id, value)?;
        Ok(value)
    }

    /// Bump the secondary counter (a visit). Saturates at `u64::MAX`.
    pub fn increment_secondary(&mut self, id: EntityId, by: u64) -> Result<u64> {
        let current = self.get(id).ok_or(RankError::NotFound { id })?.secondary_score;
        let value = current.saturating_add(by);

        self.update_secondary(id, value)?;
        Ok(value)
    }

    /// Remove `id`, returning the entity as it was stored.
    pub fn delete(&mut self, id: EntityId) -> Result<ScoredEntity> {
        let slot = self.index.remove(&id).ok_or(RankError::NotFound { id })?;
        let removed = self.slots.swap_remove(slot);

        if slot < self.slots.len() {
            let moved = self.slots[slot].id;
            self.index.insert(moved, slot);
            self.restore(slot);
        }

        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    /// The best `k` entities in composite-descending order.
    ///
    /// Pops from a copy of the backing array; the live heap is untouched.
    /// `k >= len()` yields a full heap-sort of the contents.
    pub fn top_k(&self, k: usize) -> Vec<ScoredEntity> {
        let take = k.min(self.slots.len());

        if take == 0 {
            return Vec::new();
        }

        let mut scratch = self.slots.clone();
        let mut out = Vec::with_capacity(take);

        for _ in 0..take {
            out.push(scratch.swap_remove(0));

            if !scratch.is_empty() {
                sift_down_with(&mut scratch, 0, |_, _, _| {});
            }
        }

        out
    }

    /// Check the heap property at every slot and the id → slot bijection.
    pub fn validate(&self) -> std::result::Result<(), HeapViolation> {
        if self.index.len() != self.slots.len() {
            return Err(HeapViolation::IndexSize {
                indexed: self.index.len(),
                slots: self.slots.len(),
            });
        }

        for (&id, &slot) in &self.index {
            let found = self.slots.get(slot).map(|e| e.id);

            if found != Some(id) {
                return Err(HeapViolation::IndexMismatch { id, slot, found });
            }
        }

        for child in 1..self.slots.len() {
            let parent = (child - 1) / 2;

            if self.slots[child].ranks_above(&self.slots[parent]) {
                return Err(HeapViolation::Order { parent, child });
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn slot_of(&self, id: EntityId) -> Result<usize> {
        self.index.get(&id).copied().ok_or(RankError::NotFound { id })
    }

    /// Re-establish order around `slot` after one of its fields changed.
    ///
    /// The rest of the heap was valid before the change, so the entry can
    /// only be out of place towards its parent or towards its children.
    fn restore(&mut self, slot: usize) {
        if self.sift_up(slot) == slot {
            self.sift_down(slot);
        }
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;

            if composite_cmp(&self.slots[slot], &self.slots[parent]) != Ordering::Greater {
                break;
            }

            self.swap(slot, parent);
            slot = parent;
        }

        slot
    }

    fn sift_down(&mut self, slot: usize) -> usize {
        let Self { slots, index } = self;

        sift_down_with(slots, slot, |slots, a, b| {
            index.insert(slots[a].id, a);
            index.insert(slots[b].id, b);
        })
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
        self.index.insert(self.slots[a].id, a);
        self.index.insert(self.slots[b].id, b);
    }
}

/// Sift `slot` down within `slots`, calling `on_swap` after every exchange.
/// Returns the final resting slot.
fn sift_down_with<F>(slots: &mut [ScoredEntity], mut slot: usize, mut on_swap: F) -> usize
where
    F: FnMut(&[ScoredEntity], usize, usize),
{
    let len = slots.len();

    loop {
        let left = 2 * slot + 1;

        if left >= len {
            break;
        }

        let right = left + 1;
        let mut largest = slot;

        if composite_cmp(&slots[left], &slots[largest]) == Ordering::Greater {
            largest = left;
        }

        if right < len && composite_cmp(&slots[right], &slots[largest]) == Ordering::Greater {
            largest = right;
        }

        if largest == slot {
            break;
        }

        slots.swap(slot, largest);
        on_swap(slots, slot, largest);
        slot = largest;
    }

    slot
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
