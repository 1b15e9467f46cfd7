//! Hand-off shape for persistence collaborators.
//!
//! The engine defines no storage format: a collaborator serialises these
//! however it likes and feeds them back through
//! [`RankingEngine::restore`](crate::RankingEngine::restore), which replays
//! them as inserts.

use serde::{Deserialize, Serialize};
use toprank_core::ScoredEntity;

/// A category's entity set, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDump {
    pub name: String,
    pub entities: Vec<ScoredEntity>,
}

impl CategoryDump {
    pub fn new(name: impl Into<String>, entities: Vec<ScoredEntity>) -> Self {
        Self {
            name: name.into(),
            entities,
        }
    }
}
