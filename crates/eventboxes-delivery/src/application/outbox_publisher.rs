//! Producer-side entry point: record an event in the outbox as part of the
//! caller's business transaction.

use std::sync::Arc;

use eventboxes_core::clock::Clock;
use eventboxes_core::error::StoreError;
use eventboxes_core::event::{ExtraProperties, OutgoingEventInfo};
use eventboxes_core::outbox::EventOutbox;
use serde::Serialize;
use uuid::Uuid;

/// Serializes domain events and enqueues them in an outbox.
///
/// Nothing leaves the process here. The event becomes visible to the outbox
/// sender only when the caller commits `uow`, and disappears with it on
/// rollback.
pub struct OutboxEventPublisher<O> {
    outbox: O,
    clock: Arc<dyn Clock>,
}

impl<O: std::fmt::Debug> std::fmt::Debug for OutboxEventPublisher<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxEventPublisher")
            .field("outbox", &self.outbox)
            .finish_non_exhaustive()
    }
}

impl<O: EventOutbox> OutboxEventPublisher<O> {
    /// Creates a publisher stamping creation times with `clock`.
    #[must_use]
    pub fn new(outbox: O, clock: Arc<dyn Clock>) -> Self {
        Self { outbox, clock }
    }

    /// Opens a unit of work on the outbox for callers without one of their own.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the transaction cannot be started.
    pub async fn begin(&self) -> Result<O::UnitOfWork, StoreError> {
        self.outbox.begin().await
    }

    /// Serializes `payload` as JSON and enqueues it under `event_name` in
    /// `uow`. Returns the id of the outgoing event.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if `payload` cannot be serialized,
    /// or the outbox's error if the insert fails.
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        uow: &mut O::UnitOfWork,
        event_name: &str,
        payload: &T,
        extra_properties: ExtraProperties,
    ) -> Result<Uuid, StoreError> {
        let event_data =
            serde_json::to_vec(payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let event = OutgoingEventInfo {
            id: Uuid::now_v7(),
            event_name: event_name.to_owned(),
            event_data,
            creation_time: self.clock.now(),
            extra_properties,
        };

        self.outbox.enqueue(uow, &event).await?;
        Ok(event.id)
    }
}
