//! Outbox sender: drains waiting outgoing events to the message transport.
//!
//! Each cycle takes the sender's distributed lock, fetches one page of waiting
//! events oldest first, publishes it and then deletes whatever the transport
//! confirmed. Fetch and delete run in separate short units of work; the lock
//! keeps other instances off the page in between. Events whose publish failed
//! stay in the outbox for the next cycle, so delivery is at-least-once.

use eventboxes_core::error::ProcessingError;
use eventboxes_core::event::OutgoingEventInfo;
use eventboxes_core::lock::{DistributedLock, LockHandle};
use eventboxes_core::options::BoxesOptions;
use eventboxes_core::outbox::EventOutbox;
use eventboxes_core::publisher::EventPublisher;
use eventboxes_core::uow::UnitOfWork;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::outcome::CycleOutcome;

/// Periodic job publishing the contents of one outbox.
#[derive(Debug)]
pub struct OutboxSender<O, P, L> {
    name: String,
    outbox: O,
    publisher: P,
    lock: L,
    options: BoxesOptions,
}

/// Events published in one cycle and the number left behind by a failure.
struct Published {
    ids: Vec<Uuid>,
    failed: usize,
}

impl<O, P, L> OutboxSender<O, P, L>
where
    O: EventOutbox,
    P: EventPublisher,
    L: DistributedLock,
{
    /// Creates a sender for the outbox called `name`. The name scopes the
    /// distributed lock, so senders of different outboxes never contend.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        outbox: O,
        publisher: P,
        lock: L,
        options: BoxesOptions,
    ) -> Self {
        Self {
            name: name.into(),
            outbox,
            publisher,
            lock,
            options,
        }
    }

    /// Name of the distributed lock this sender takes.
    #[must_use]
    pub fn lock_name(&self) -> String {
        format!("outbox-sender:{}", self.name)
    }

    /// Runs one cycle.
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError` if the lock provider or the outbox fails, or
    /// if `cancel` fires before the cycle finishes. Nothing is deleted in
    /// that case.
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, ProcessingError> {
        if cancel.is_cancelled() {
            return Err(ProcessingError::Cancelled);
        }

        let lock_name = self.lock_name();
        let Some(handle) = self
            .lock
            .try_acquire(&lock_name, self.options.distributed_lock_wait_duration)
            .await?
        else {
            tracing::debug!(lock = %lock_name, "outbox sender lock busy, skipping cycle");
            return Ok(CycleOutcome::Skipped);
        };

        let result = self.drain(cancel).await;

        if let Err(e) = handle.release().await {
            tracing::warn!(lock = %lock_name, error = %e, "failed to release outbox sender lock");
        }
        result
    }

    async fn drain(&self, cancel: &CancellationToken) -> Result<CycleOutcome, ProcessingError> {
        let events = self.fetch_page(cancel).await?;
        if events.is_empty() {
            return Ok(CycleOutcome::IDLE);
        }
        tracing::debug!(outbox = %self.name, count = events.len(), "publishing outgoing events");

        let published = if self.options.batch_publish_outbox_events {
            self.publish_batch(&events).await
        } else {
            self.publish_each(&events, cancel).await?
        };

        if !published.ids.is_empty() {
            let mut uow = self.outbox.begin().await?;
            self.outbox
                .delete_many(&mut uow, &published.ids, cancel)
                .await?;
            uow.commit().await?;
        }

        tracing::debug!(
            outbox = %self.name,
            published = published.ids.len(),
            failed = published.failed,
            "outbox cycle finished"
        );
        Ok(CycleOutcome::Completed {
            processed: published.ids.len(),
            failed: published.failed,
        })
    }

    /// Reads one page in its own short unit of work. No store transaction
    /// stays open while the transport is called.
    async fn fetch_page(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<OutgoingEventInfo>, ProcessingError> {
        let mut uow = self.outbox.begin().await?;
        let events = self
            .outbox
            .get_waiting_events(
                &mut uow,
                self.options.outbox_waiting_event_max_count,
                self.options.outbox_processor_filter.as_ref(),
                cancel,
            )
            .await?;
        uow.commit().await?;
        Ok(events)
    }

    /// One transport call for the whole page; a failure leaves all of it.
    async fn publish_batch(&self, events: &[OutgoingEventInfo]) -> Published {
        match self.publisher.publish_many(events).await {
            Ok(()) => Published {
                ids: events.iter().map(|e| e.id).collect(),
                failed: 0,
            },
            Err(e) => {
                tracing::warn!(
                    outbox = %self.name,
                    count = events.len(),
                    error = %e,
                    "batch publish failed, page stays waiting"
                );
                Published {
                    ids: Vec::new(),
                    failed: events.len(),
                }
            }
        }
    }

    /// Publishes in page order and stops at the first failure, so a later
    /// event never overtakes an earlier one.
    async fn publish_each(
        &self,
        events: &[OutgoingEventInfo],
        cancel: &CancellationToken,
    ) -> Result<Published, ProcessingError> {
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            if cancel.is_cancelled() {
                return Err(ProcessingError::Cancelled);
            }
            if let Err(e) = self.publisher.publish(event).await {
                tracing::warn!(
                    outbox = %self.name,
                    event_id = %event.id,
                    event_name = %event.event_name,
                    error = %e,
                    "publish failed, event stays waiting"
                );
                break;
            }
            ids.push(event.id);
        }
        let failed = events.len() - ids.len();
        Ok(Published { ids, failed })
    }
}
