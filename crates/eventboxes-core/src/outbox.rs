//! Outgoing event store abstraction.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::StoreError;
use crate::event::OutgoingEventInfo;
use crate::filter::{OutgoingEventField, Predicate};
use crate::uow::UnitOfWork;

/// Durable, append/delete-only record of events waiting to be published.
#[async_trait]
pub trait EventOutbox: Send + Sync {
    /// The transaction scope this store runs in.
    type UnitOfWork: UnitOfWork;

    /// Opens a new transaction scope.
    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError>;

    /// Appends `event` inside `uow`. The event becomes visible to the sender
    /// only once `uow` commits.
    async fn enqueue(
        &self,
        uow: &mut Self::UnitOfWork,
        event: &OutgoingEventInfo,
    ) -> Result<(), StoreError>;

    /// Returns up to `max_count` waiting events, oldest first, optionally
    /// narrowed by `filter`.
    async fn get_waiting_events(
        &self,
        uow: &mut Self::UnitOfWork,
        max_count: usize,
        filter: Option<&Predicate<OutgoingEventField>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<OutgoingEventInfo>, StoreError>;

    /// Permanently removes the event with `id`. Unknown ids are ignored.
    async fn delete(&self, uow: &mut Self::UnitOfWork, id: Uuid) -> Result<(), StoreError>;

    /// Permanently removes exactly the events in `ids`. Unknown ids are ignored.
    async fn delete_many(
        &self,
        uow: &mut Self::UnitOfWork,
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;
}
