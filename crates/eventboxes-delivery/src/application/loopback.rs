//! In-process transport delivering outgoing events straight into an inbox.

use async_trait::async_trait;
use eventboxes_core::error::PublishError;
use eventboxes_core::event::OutgoingEventInfo;
use eventboxes_core::inbox::EventInbox;
use eventboxes_core::publisher::EventPublisher;
use eventboxes_core::uow::UnitOfWork;

use crate::application::ingestion::{EventIngestor, IncomingMessage};

/// Publishes by ingesting into a local inbox.
///
/// Each publish call commits its own inbox transaction. Redelivered events
/// are recognised by their id and acknowledged without being stored twice.
#[derive(Debug)]
pub struct LoopbackPublisher<I> {
    ingestor: EventIngestor<I>,
}

impl<I: EventInbox> LoopbackPublisher<I> {
    /// Creates a publisher feeding `ingestor`.
    #[must_use]
    pub fn new(ingestor: EventIngestor<I>) -> Self {
        Self { ingestor }
    }

    async fn deliver(&self, events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        let mut uow = self.ingestor.begin().await.map_err(transport)?;
        for event in events {
            self.ingestor
                .receive(&mut uow, IncomingMessage::from(event))
                .await
                .map_err(transport)?;
        }
        uow.commit().await.map_err(transport)
    }
}

fn transport(err: eventboxes_core::error::StoreError) -> PublishError {
    PublishError::Transport(err.to_string())
}

#[async_trait]
impl<I: EventInbox> EventPublisher for LoopbackPublisher<I> {
    async fn publish(&self, event: &OutgoingEventInfo) -> Result<(), PublishError> {
        self.deliver(std::slice::from_ref(event)).await
    }

    async fn publish_many(&self, events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        self.deliver(events).await
    }
}
