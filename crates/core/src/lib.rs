//! Ranking primitives: the composite-ordered entity, the indexed max-heap
//! that owns one category's entities, and the K-way merge over pre-sorted
//! snapshots.
//!
//! Everything here is synchronous, in-memory and single-writer. Callers that
//! share a heap across threads must serialise mutations themselves.

pub mod config;
pub mod entity;
pub mod error;
pub mod heap;
pub mod merge;

pub use config::{EngineSettings, StrategyKind};
pub use entity::{EntityId, ScoredEntity, composite_cmp, is_sorted_desc};
pub use error::{RankError, Result};
pub use heap::{HeapViolation, IndexedMaxHeap};
pub use merge::{KWayMerge, merge_sorted, merge_sorted_within};
