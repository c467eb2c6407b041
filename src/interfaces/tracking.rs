//! Tracking record store interface.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::model::PromoteResult;

/// Result type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Errors that can occur while persisting tracking records.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrackingError {
    #[error("Tracking store unavailable: {0}")]
    Unavailable(String),

    #[error("No tracking store configured")]
    NotConfigured,
}

/// Durable store of promotion results keyed by `(tracking_id, promotion_id)`.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    async fn put(&self, tracking_id: &str, promotion_id: &str, result: &PromoteResult)
        -> Result<()>;

    /// All results recorded under a tracking id, keyed by promotion id.
    async fn get(&self, tracking_id: &str) -> Result<BTreeMap<String, PromoteResult>>;

    async fn delete(&self, tracking_id: &str) -> Result<()>;
}
