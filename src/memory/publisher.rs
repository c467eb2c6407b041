//! Completion event publishers: no-op and in-memory channel.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::interfaces::{EventPublisher, PublishError};
use crate::model::PromoteCompleteEvent;

/// No-op publisher that logs but doesn't actually send anywhere.
///
/// Used when no event bus is configured.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, event: PromoteCompleteEvent) -> Result<(), PublishError> {
        debug!(
            promotion_id = %event.promotion_id,
            target = %event.target,
            "Event publisher not configured, dropping completion event"
        );
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// In-memory publisher using a channel.
///
/// Used for standalone mode and testing.
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<PromoteCompleteEvent>,
}

impl ChannelEventPublisher {
    /// Create a new channel-based publisher.
    ///
    /// Returns the publisher and a receiver for consuming events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PromoteCompleteEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: PromoteCompleteEvent) -> Result<(), PublishError> {
        info!(
            promotion_id = %event.promotion_id,
            completed = event.completed_paths.len(),
            "Publishing completion event to channel"
        );
        self.sender
            .send(event)
            .map_err(|e| PublishError::PublishFailed(e.to_string()))
    }
}
