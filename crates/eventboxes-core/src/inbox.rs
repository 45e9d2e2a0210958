//! Incoming event store abstraction.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::IncomingEventInfo;
use crate::filter::{IncomingEventField, Predicate};
use crate::uow::UnitOfWork;

/// Durable record of received events, deduplicated by message id.
#[async_trait]
pub trait EventInbox: Send + Sync {
    /// The transaction scope this store runs in.
    type UnitOfWork: UnitOfWork;

    /// Opens a new transaction scope.
    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError>;

    /// Appends `event` inside `uow`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateMessage`] if an event with the same
    /// message id is already stored.
    async fn enqueue(
        &self,
        uow: &mut Self::UnitOfWork,
        event: &IncomingEventInfo,
    ) -> Result<(), StoreError>;

    /// Returns up to `max_count` unprocessed events, oldest first, optionally
    /// narrowed by `filter`.
    async fn get_waiting_events(
        &self,
        uow: &mut Self::UnitOfWork,
        max_count: usize,
        filter: Option<&Predicate<IncomingEventField>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<IncomingEventInfo>, StoreError>;

    /// Flags the event with `id` as processed and stamps the processing time.
    async fn mark_as_processed(
        &self,
        uow: &mut Self::UnitOfWork,
        id: Uuid,
    ) -> Result<(), StoreError>;

    /// Returns `true` if an event with `message_id` has been received.
    async fn exists_by_message_id(
        &self,
        uow: &mut Self::UnitOfWork,
        message_id: &str,
    ) -> Result<bool, StoreError>;

    /// Purges processed events whose processing time is older than the
    /// store's retention window. Unprocessed events are never purged.
    /// Returns the number of purged events.
    async fn delete_old_events(
        &self,
        uow: &mut Self::UnitOfWork,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError>;
}
