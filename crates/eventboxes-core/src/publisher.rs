//! Message transport abstraction consumed by the outbox sender.

use async_trait::async_trait;

use crate::error::PublishError;
use crate::event::OutgoingEventInfo;

/// Hands outgoing events to a message distribution channel.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a single event.
    async fn publish(&self, event: &OutgoingEventInfo) -> Result<(), PublishError>;

    /// Publishes a page of events in one call.
    ///
    /// An `Err` means the sender treats the whole page as unpublished and
    /// retries all of it. Implementations that cannot deliver a page
    /// atomically may therefore cause duplicate deliveries, never lost ones.
    /// The default implementation publishes one by one and stops at the first
    /// failure.
    async fn publish_many(&self, events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<T> {
    async fn publish(&self, event: &OutgoingEventInfo) -> Result<(), PublishError> {
        (**self).publish(event).await
    }

    async fn publish_many(&self, events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        (**self).publish_many(events).await
    }
}
