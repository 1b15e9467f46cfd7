use crate::entity::EntityId;

/// Errors raised by the ranking core.
///
/// `DuplicateKey` and `NotFound` point at an upstream bookkeeping bug and are
/// always surfaced, never absorbed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RankError {
    #[error("entity {id} is already present")]
    DuplicateKey { id: EntityId },

    #[error("entity {id} not found")]
    NotFound { id: EntityId },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("category already exists: {0}")]
    DuplicateCategory(String),

    #[error("time budget exhausted after emitting {emitted} entities")]
    BudgetExceeded { emitted: usize },
}

pub type Result<T> = std::result::Result<T, RankError>;
