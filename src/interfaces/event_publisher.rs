//! Completion event publisher interface.

use async_trait::async_trait;

use crate::model::PromoteCompleteEvent;

/// Errors that can occur while publishing completion events.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    #[error("Event publisher not configured")]
    NotConfigured,

    #[error("Failed to publish event: {0}")]
    PublishFailed(String),
}

/// Trait for publishing promotion completion events.
///
/// Delivery is at-least-once and fire-and-forget from the orchestrator's
/// point of view; a failure here never fails a promotion.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PromoteCompleteEvent) -> Result<(), PublishError>;

    /// Check if the publisher is configured and ready.
    fn is_configured(&self) -> bool {
        true
    }
}
