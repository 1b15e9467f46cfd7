//! Category-aware ranking: one indexed heap per category, Top-K reads with
//! cached snapshots, and deduplicated multi-category recommendations.
//!
//! Writers hold `&mut RankingEngine`; any number of readers can share
//! `&RankingEngine` (or a [`RecommendationService`]) across threads.

mod category;
mod dump;
mod engine;
mod event;
mod recommend;
mod strategy;

pub use dump::CategoryDump;
pub use engine::RankingEngine;
pub use event::MutationEvent;
pub use recommend::{Recommendation, RecommendRequest, RecommendationService};

pub use toprank_core::{EngineSettings, EntityId, RankError, Result, ScoredEntity, StrategyKind};
