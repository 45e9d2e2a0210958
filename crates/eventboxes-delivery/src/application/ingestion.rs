//! Receiving transported events into the inbox.
//!
//! The message id is the deduplication boundary: a message whose id the inbox
//! already holds is acknowledged without being stored again.

use std::sync::Arc;

use eventboxes_core::clock::Clock;
use eventboxes_core::error::StoreError;
use eventboxes_core::event::{ExtraProperties, IncomingEventInfo, OutgoingEventInfo};
use eventboxes_core::inbox::EventInbox;
use uuid::Uuid;

/// An event as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Delivery identity assigned by the sender.
    pub message_id: String,
    /// Event name used to resolve handlers.
    pub event_name: String,
    /// Opaque serialized payload.
    pub event_data: Vec<u8>,
    /// Properties travelling with the event.
    pub extra_properties: ExtraProperties,
}

impl From<&OutgoingEventInfo> for IncomingMessage {
    /// The outgoing event id becomes the message id, so redelivering the same
    /// outgoing event is recognised as a duplicate.
    fn from(event: &OutgoingEventInfo) -> Self {
        Self {
            message_id: event.id.to_string(),
            event_name: event.event_name.clone(),
            event_data: event.event_data.clone(),
            extra_properties: event.extra_properties.clone(),
        }
    }
}

/// Result of receiving one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Stored under the given inbox id.
    Accepted(Uuid),
    /// Already received earlier; nothing stored.
    Duplicate,
}

/// Stores transported messages in an inbox, once per message id.
pub struct EventIngestor<I> {
    inbox: I,
    clock: Arc<dyn Clock>,
}

impl<I: std::fmt::Debug> std::fmt::Debug for EventIngestor<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIngestor")
            .field("inbox", &self.inbox)
            .finish_non_exhaustive()
    }
}

impl<I: EventInbox> EventIngestor<I> {
    /// Creates an ingestor stamping creation times with `clock`.
    #[must_use]
    pub fn new(inbox: I, clock: Arc<dyn Clock>) -> Self {
        Self { inbox, clock }
    }

    /// The inbox messages are stored in.
    #[must_use]
    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    /// Opens a unit of work on the inbox.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the transaction cannot be started.
    pub async fn begin(&self) -> Result<I::UnitOfWork, StoreError> {
        self.inbox.begin().await
    }

    /// Stores `message` inside `uow` unless its message id was seen before.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the inbox fails. A duplicate is not an error.
    pub async fn receive(
        &self,
        uow: &mut I::UnitOfWork,
        message: IncomingMessage,
    ) -> Result<Ingested, StoreError> {
        if self
            .inbox
            .exists_by_message_id(uow, &message.message_id)
            .await?
        {
            tracing::debug!(message_id = %message.message_id, "duplicate message ignored");
            return Ok(Ingested::Duplicate);
        }

        let event = IncomingEventInfo {
            id: Uuid::now_v7(),
            message_id: message.message_id,
            event_name: message.event_name,
            event_data: message.event_data,
            creation_time: self.clock.now(),
            extra_properties: message.extra_properties,
        };

        match self.inbox.enqueue(uow, &event).await {
            Ok(()) => Ok(Ingested::Accepted(event.id)),
            // Lost a race with a concurrent delivery of the same message.
            Err(StoreError::DuplicateMessage(message_id)) => {
                tracing::debug!(%message_id, "duplicate message ignored");
                Ok(Ingested::Duplicate)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use eventboxes_core::uow::UnitOfWork;
    use eventboxes_test_support::{FailingEventInbox, FixedClock, InMemoryEventInbox};

    use super::*;

    fn message(message_id: &str) -> IncomingMessage {
        IncomingMessage {
            message_id: message_id.to_owned(),
            event_name: "OrderCreated".to_owned(),
            event_data: br#"{"order_id":7}"#.to_vec(),
            extra_properties: ExtraProperties::new(),
        }
    }

    fn ingestor() -> (EventIngestor<InMemoryEventInbox>, InMemoryEventInbox) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        ));
        let inbox = InMemoryEventInbox::new(Arc::clone(&clock), Duration::from_secs(7200));
        (EventIngestor::new(inbox.clone(), clock), inbox)
    }

    #[tokio::test]
    async fn test_receive_stores_new_message() {
        // Arrange
        let (ingestor, inbox) = ingestor();

        // Act
        let mut uow = ingestor.begin().await.unwrap();
        let result = ingestor.receive(&mut uow, message("m1")).await.unwrap();
        uow.commit().await.unwrap();

        // Assert
        let Ingested::Accepted(id) = result else {
            panic!("expected Accepted, got {result:?}");
        };
        let stored = inbox.committed_events();
        assert_eq!(stored.len(), 1);
        let (event, processed_time) = &stored[0];
        assert_eq!(event.id, id);
        assert_eq!(event.message_id, "m1");
        assert_eq!(event.event_name, "OrderCreated");
        assert_eq!(
            event.creation_time,
            Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
        );
        assert!(processed_time.is_none());
    }

    #[tokio::test]
    async fn test_second_delivery_of_same_message_is_duplicate() {
        // Arrange
        let (ingestor, inbox) = ingestor();
        let mut uow = ingestor.begin().await.unwrap();
        ingestor.receive(&mut uow, message("m1")).await.unwrap();
        uow.commit().await.unwrap();

        // Act
        let mut uow = ingestor.begin().await.unwrap();
        let result = ingestor.receive(&mut uow, message("m1")).await.unwrap();
        uow.commit().await.unwrap();

        // Assert
        assert_eq!(result, Ingested::Duplicate);
        assert_eq!(inbox.committed_events().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_within_one_unit_of_work() {
        let (ingestor, inbox) = ingestor();

        let mut uow = ingestor.begin().await.unwrap();
        let first = ingestor.receive(&mut uow, message("m1")).await.unwrap();
        let second = ingestor.receive(&mut uow, message("m1")).await.unwrap();
        uow.commit().await.unwrap();

        assert!(matches!(first, Ingested::Accepted(_)));
        assert_eq!(second, Ingested::Duplicate);
        assert_eq!(inbox.committed_events().len(), 1);
    }

    #[test]
    fn test_message_from_outgoing_event_uses_event_id() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let event = OutgoingEventInfo::new(Uuid::new_v4(), "OrderCreated", vec![1, 2], now)
            .with_property("TenantId", "tenant-a");

        let message = IncomingMessage::from(&event);

        assert_eq!(message.message_id, event.id.to_string());
        assert_eq!(message.event_data, vec![1, 2]);
        assert_eq!(message.extra_properties, event.extra_properties);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let clock = Arc::new(FixedClock(Utc::now()));
        let ingestor = EventIngestor::new(FailingEventInbox, clock);

        let mut uow = ingestor.begin().await.unwrap();
        let result = ingestor.receive(&mut uow, message("m1")).await;

        assert!(matches!(result, Err(StoreError::Database(_))));
    }
}
