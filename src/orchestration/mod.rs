//! Promotion orchestration.
//!
//! [`PromotionOrchestrator`] drives one promotion or rollback from path
//! resolution to notification. Collaborator failures below this level are
//! folded into [`PromoteResult::error`](crate::model::PromoteResult); only
//! conditions the caller must react to (overload, a lost worker) surface as
//! [`PromoteError`].

mod promotion;

pub use promotion::PromotionOrchestrator;

use crate::pool::PoolError;

/// Result type for the produced interface.
pub type Result<T> = std::result::Result<T, PromoteError>;

/// Errors returned to callers of promote and rollback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromoteError {
    /// Capacity exhausted. Retryable.
    #[error("{pool} pool overloaded ({threshold} units admitted), retry later")]
    Overloaded { pool: String, threshold: usize },

    /// The worker running the request panicked or was cancelled.
    #[error("Promotion worker failed: {0}")]
    Join(String),
}

impl PromoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PromoteError::Overloaded { .. })
    }
}

impl From<PoolError> for PromoteError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Overloaded { pool, threshold } => PromoteError::Overloaded { pool, threshold },
        }
    }
}

impl From<tokio::task::JoinError> for PromoteError {
    fn from(e: tokio::task::JoinError) -> Self {
        PromoteError::Join(e.to_string())
    }
}
