//! The ranked value type and its composite order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{RankError, Result};

/// Stable key of an entity within its category. Never reused.
pub type EntityId = u64;

/// One rankable entity: a float primary score (rating) and an integer
/// secondary score (popularity counter).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredEntity {
    pub id: EntityId,
    pub primary_score: f64,
    pub secondary_score: u64,
}

impl ScoredEntity {
    pub fn new(id: EntityId, primary_score: f64, secondary_score: u64) -> Self {
        Self {
            id,
            primary_score,
            secondary_score,
        }
    }

    /// `true` if `self` ranks strictly above `other`.
    pub fn ranks_above(&self, other: &Self) -> bool {
        composite_cmp(self, other) == Ordering::Greater
    }

    /// `(primary, secondary)` pair, handy for comparing orderings that may
    /// legitimately permute tied ids.
    pub fn key(&self) -> (f64, u64) {
        (self.primary_score, self.secondary_score)
    }
}

/// Composite order: primary score, then secondary score.
///
/// `Greater` means `a` ranks above `b`. Entities equal on both fields compare
/// `Equal` regardless of id.
pub fn composite_cmp(a: &ScoredEntity, b: &ScoredEntity) -> Ordering {
    a.primary_score
        .total_cmp(&b.primary_score)
        .then(a.secondary_score.cmp(&b.secondary_score))
}

/// `true` if `entities` is non-increasing under the composite order.
pub fn is_sorted_desc(entities: &[ScoredEntity]) -> bool {
    entities
        .windows(2)
        .all(|w| composite_cmp(&w[0], &w[1]) != Ordering::Less)
}

/// Reject scores that would break the total order and fold `-0.0` into `0.0`.
pub(crate) fn checked_score(value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(RankError::InvalidArgument(format!(
            "primary score must be finite, got {value}"
        )));
    }

    Ok(value + 0.0)
}
