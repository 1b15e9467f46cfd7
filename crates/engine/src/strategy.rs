//! The two aggregation strategies behind a multi-category request, and the
//! `auto` policy that picks between them.
//!
//! Both feed ranked candidates into a [`TopDistinct`] collector, which owns
//! deduplication and truncation, so their outputs only differ in cost.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use toprank_core::{
    EngineSettings, EntityId, IndexedMaxHeap, KWayMerge, RankError, Result, ScoredEntity,
    StrategyKind,
};
use toprank_utils::Budget;

use crate::category::Category;

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Keeps the first occurrence of every id, in the order offered, up to `k`.
#[derive(Debug)]
pub(crate) struct TopDistinct {
    k: usize,
    seen: HashSet<EntityId>,
    out: Vec<ScoredEntity>,
}

impl TopDistinct {
    pub fn new(k: usize) -> Self {
        // `k` may be far larger than the candidate count.
        let capacity = k.min(1024);

        Self {
            k,
            seen: HashSet::with_capacity(capacity),
            out: Vec::with_capacity(capacity),
        }
    }

    /// Offer the next-ranked candidate. Returns `true` once `k` are held.
    pub fn offer(&mut self, entity: ScoredEntity) -> bool {
        if self.is_full() {
            return true;
        }

        if self.seen.insert(entity.id) {
            self.out.push(entity);
        }

        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.out.len() >= self.k
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn into_vec(self) -> Vec<ScoredEntity> {
        self.out
    }
}

// ---------------------------------------------------------------------------
// Strategy trait
// ---------------------------------------------------------------------------

pub(crate) trait RecommendationStrategy {
    fn kind(&self) -> StrategyKind;

    /// Offer candidates from `sources` to `sink` in composite-descending order
    /// until it is full or the candidates run out.
    fn aggregate(
        &self,
        sources: &[&Category],
        sink: &mut TopDistinct,
        budget: Option<&Budget>,
    ) -> Result<()>;
}

fn check_budget(budget: Option<&Budget>, sink: &TopDistinct) -> Result<()> {
    match budget {
        Some(b) if b.is_exhausted() => Err(RankError::BudgetExceeded { emitted: sink.len() }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Merge: per-category snapshots + K-way merge
// ---------------------------------------------------------------------------

pub(crate) struct MergeStrategy {
    pub k: usize,
    pub use_cache: bool,
    pub linear_max_inputs: usize,
}

impl RecommendationStrategy for MergeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Merge
    }

    fn aggregate(
        &self,
        sources: &[&Category],
        sink: &mut TopDistinct,
        budget: Option<&Budget>,
    ) -> Result<()> {
        let snapshots: Vec<Arc<[ScoredEntity]>> = sources
            .iter()
            .map(|c| c.snapshot(self.k, self.use_cache))
            .collect();

        let inputs = snapshots.iter().map(|s| &s[..self.k.min(s.len())]);

        for entity in KWayMerge::auto(inputs, self.linear_max_inputs) {
            check_budget(budget, sink)?;

            if sink.offer(entity) {
                break;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unified: one throwaway heap over every candidate
// ---------------------------------------------------------------------------

pub(crate) struct UnifiedStrategy {
    pub k: usize,
}

impl RecommendationStrategy for UnifiedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Unified
    }

    fn aggregate(
        &self,
        sources: &[&Category],
        sink: &mut TopDistinct,
        budget: Option<&Budget>,
    ) -> Result<()> {
        let total = sources.iter().map(|c| c.len()).sum();
        let mut pool = IndexedMaxHeap::with_capacity(total);

        for category in sources {
            check_budget(budget, sink)?;

            for &entity in category.heap().iter() {
                keep_best(&mut pool, entity)?;
            }
        }

        for entity in pool.top_k(self.k) {
            if sink.offer(entity) {
                break;
            }
        }

        Ok(())
    }
}

/// Insert `entity`, or overwrite an existing copy of the same id if `entity`
/// ranks above it.
fn keep_best(pool: &mut IndexedMaxHeap, entity: ScoredEntity) -> Result<()> {
    match pool.get(entity.id).copied() {
        None => pool.insert_entity(entity),
        Some(existing) if entity.ranks_above(&existing) => {
            pool.update_primary(entity.id, entity.primary_score)?;
            pool.update_secondary(entity.id, entity.secondary_score)
        }
        Some(_) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Auto policy
// ---------------------------------------------------------------------------

/// Resolve `auto` to a concrete strategy for this request.
///
/// Warm snapshots for every source make `merge` nearly free. Otherwise go
/// unified once the snapshots would cover most of the candidates anyway.
pub(crate) fn choose(sources: &[&Category], k: usize, settings: &EngineSettings) -> StrategyKind {
    if sources.is_empty() {
        return StrategyKind::Merge;
    }

    if settings.snapshot_cache && sources.iter().all(|c| c.is_warm(k)) {
        debug!(categories = sources.len(), k, "all snapshots warm, merging");
        return StrategyKind::Merge;
    }

    let total: usize = sources.iter().map(|c| c.len()).sum();
    let coverage = sources.len() as f64 * k as f64;

    let kind = if coverage >= settings.unified_coverage_ratio * total as f64 {
        StrategyKind::Unified
    } else {
        StrategyKind::Merge
    };

    debug!(categories = sources.len(), k, total, %kind, "auto strategy chosen");
    kind
}
