//! K-way merge of sequences already sorted by the composite order.
//!
//! The heap form keeps one frontier cursor per unexhausted input in a
//! `BinaryHeap`, so every emission costs O(log N). For a handful of inputs a
//! plain linear scan over the frontiers is cheaper and gives the same output.
//!
//! Inputs are trusted to be sorted; this is only asserted in debug builds.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use toprank_utils::Budget;

use crate::entity::{ScoredEntity, composite_cmp, is_sorted_desc};
use crate::error::{RankError, Result};

/// Input counts at or below this use the linear frontier scan.
pub const DEFAULT_LINEAR_MAX_INPUTS: usize = 4;

// ---------------------------------------------------------------------------
// Frontier cursor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Cursor {
    entity: ScoredEntity,
    source: usize,
    position: usize,
}

impl Ord for Cursor {
    // Max-heap on the composite order; on a full tie the lower source wins so
    // equal entities come out in input order.
    fn cmp(&self, other: &Self) -> Ordering {
        composite_cmp(&self.entity, &other.entity).then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for Cursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cursor {}

enum Frontier {
    Heap(BinaryHeap<Cursor>),
    /// Next unread position of every input.
    Linear(Vec<usize>),
}

// ---------------------------------------------------------------------------
// KWayMerge
// ---------------------------------------------------------------------------

/// Lazy merged view over several sorted slices.
///
/// Yields entities in composite-descending order; stop pulling whenever
/// enough have been produced.
pub struct KWayMerge<'a> {
    inputs: Vec<&'a [ScoredEntity]>,
    frontier: Frontier,
    remaining: usize,
}

impl<'a> KWayMerge<'a> {
    /// Priority-queue merge, O(log N) per emission.
    pub fn new<I>(inputs: I) -> Self
    where
        I: IntoIterator<Item = &'a [ScoredEntity]>,
    {
        let inputs = collect_inputs(inputs);
        let mut heap = BinaryHeap::with_capacity(inputs.len());

        for (source, input) in inputs.iter().enumerate() {
            if let Some(&entity) = input.first() {
                heap.push(Cursor {
                    entity,
                    source,
                    position: 0,
                });
            }
        }

        Self::from_parts(inputs, Frontier::Heap(heap))
    }

    /// Linear frontier scan, O(N) per emission and no allocation per step.
    pub fn linear<I>(inputs: I) -> Self
    where
        I: IntoIterator<Item = &'a [ScoredEntity]>,
    {
        let inputs = collect_inputs(inputs);
        let positions = vec![0; inputs.len()];

        Self::from_parts(inputs, Frontier::Linear(positions))
    }

    /// Pick the linear scan when there are at most `linear_max_inputs`
    /// non-empty inputs, the priority queue otherwise.
    pub fn auto<I>(inputs: I, linear_max_inputs: usize) -> Self
    where
        I: IntoIterator<Item = &'a [ScoredEntity]>,
    {
        let inputs: Vec<&'a [ScoredEntity]> =
            inputs.into_iter().filter(|s| !s.is_empty()).collect();

        if inputs.len() <= linear_max_inputs {
            Self::linear(inputs)
        } else {
            Self::new(inputs)
        }
    }

    /// Stop after `limit` emissions.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.remaining = self.remaining.min(limit);
        self
    }

    fn from_parts(inputs: Vec<&'a [ScoredEntity]>, frontier: Frontier) -> Self {
        let remaining = inputs.iter().map(|s| s.len()).sum();

        Self {
            inputs,
            frontier,
            remaining,
        }
    }

    fn next_from_heap(inputs: &[&'a [ScoredEntity]], heap: &mut BinaryHeap<Cursor>) -> Option<ScoredEntity> {
        let cursor = heap.pop()?;
        let position = cursor.position + 1;

        if let Some(&entity) = inputs[cursor.source].get(position) {
            heap.push(Cursor {
                entity,
                source: cursor.source,
                position,
            });
        }

        Some(cursor.entity)
    }

    fn next_from_scan(inputs: &[&'a [ScoredEntity]], positions: &mut [usize]) -> Option<ScoredEntity> {
        let mut best: Option<(usize, ScoredEntity)> = None;

        for (source, input) in inputs.iter().enumerate() {
            let Some(&candidate) = input.get(positions[source]) else {
                continue;
            };

            match best {
                Some((_, current)) if !candidate.ranks_above(&current) => {}
                _ => best = Some((source, candidate)),
            }
        }

        let (source, entity) = best?;
        positions[source] += 1;
        Some(entity)
    }
}

impl Iterator for KWayMerge<'_> {
    type Item = ScoredEntity;

    fn next(&mut self) -> Option<ScoredEntity> {
        if self.remaining == 0 {
            return None;
        }

        let next = match &mut self.frontier {
            Frontier::Heap(heap) => Self::next_from_heap(&self.inputs, heap),
            Frontier::Linear(positions) => Self::next_from_scan(&self.inputs, positions),
        };

        if next.is_some() {
            self.remaining -= 1;
        }

        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for KWayMerge<'_> {}

fn collect_inputs<'a, I>(inputs: I) -> Vec<&'a [ScoredEntity]>
where
    I: IntoIterator<Item = &'a [ScoredEntity]>,
{
    let inputs: Vec<&'a [ScoredEntity]> = inputs.into_iter().collect();

    debug_assert!(
        inputs.iter().all(|s| is_sorted_desc(s)),
        "k-way merge input is not sorted by composite order"
    );

    inputs
}

// ---------------------------------------------------------------------------
// Eager helpers
// ---------------------------------------------------------------------------

/// Merge `inputs` into one sorted vector, optionally bounded to `limit`.
pub fn merge_sorted(inputs: &[&[ScoredEntity]], limit: Option<usize>) -> Vec<ScoredEntity> {
    let merge = KWayMerge::auto(inputs.iter().copied(), DEFAULT_LINEAR_MAX_INPUTS);

    match limit {
        Some(limit) => merge.with_limit(limit).collect(),
        None => merge.collect(),
    }
}

/// Like [`merge_sorted`], but gives up with `BudgetExceeded` once `budget`
/// runs out. The budget is checked between emissions.
pub fn merge_sorted_within(
    inputs: &[&[ScoredEntity]],
    limit: Option<usize>,
    budget: &Budget,
) -> Result<Vec<ScoredEntity>> {
    let mut merge = KWayMerge::auto(inputs.iter().copied(), DEFAULT_LINEAR_MAX_INPUTS);

    if let Some(limit) = limit {
        merge = merge.with_limit(limit);
    }

    let mut out = Vec::with_capacity(merge.len());

    for entity in merge {
        if budget.is_exhausted() {
            return Err(RankError::BudgetExceeded { emitted: out.len() });
        }
        out.push(entity);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
