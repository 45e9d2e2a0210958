//! Inbox processor: drains received events to local handlers.
//!
//! Each cycle takes the processor's distributed lock, purges old processed
//! events when the cleanup interval has elapsed, then hands one page of
//! waiting events (oldest first) to the handlers registered for their names.
//! Events whose handlers all succeed are marked processed; the rest stay
//! waiting and are retried next cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use eventboxes_core::clock::Clock;
use eventboxes_core::error::{HandlerError, ProcessingError};
use eventboxes_core::event::IncomingEventInfo;
use eventboxes_core::inbox::EventInbox;
use eventboxes_core::lock::{DistributedLock, LockHandle};
use eventboxes_core::options::BoxesOptions;
use eventboxes_core::uow::UnitOfWork;
use tokio_util::sync::CancellationToken;

use crate::domain::outcome::CycleOutcome;
use crate::domain::registry::EventHandlerRegistry;

const NEVER_CLEANED: i64 = i64::MIN;

/// Periodic job handling the contents of one inbox.
pub struct InboxProcessor<I, L> {
    name: String,
    inbox: I,
    lock: L,
    registry: EventHandlerRegistry,
    clock: Arc<dyn Clock>,
    options: BoxesOptions,
    /// Millisecond timestamp of the last successful cleanup.
    last_cleanup: AtomicI64,
}

impl<I: std::fmt::Debug, L: std::fmt::Debug> std::fmt::Debug for InboxProcessor<I, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxProcessor")
            .field("name", &self.name)
            .field("inbox", &self.inbox)
            .field("lock", &self.lock)
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<I, L> InboxProcessor<I, L>
where
    I: EventInbox,
    L: DistributedLock,
{
    /// Creates a processor for the inbox called `name`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        inbox: I,
        lock: L,
        registry: EventHandlerRegistry,
        clock: Arc<dyn Clock>,
        options: BoxesOptions,
    ) -> Self {
        Self {
            name: name.into(),
            inbox,
            lock,
            registry,
            clock,
            options,
            last_cleanup: AtomicI64::new(NEVER_CLEANED),
        }
    }

    /// Name of the distributed lock this processor takes.
    #[must_use]
    pub fn lock_name(&self) -> String {
        format!("inbox-processor:{}", self.name)
    }

    /// Runs one cycle.
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError` if the lock provider or the inbox fails, or
    /// if `cancel` fires mid-cycle. Events marked before cancellation stay
    /// marked.
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
            tracing::debug!(lock = %lock_name, "inbox processor lock busy, skipping cycle");
            return Ok(CycleOutcome::Skipped);
        };

        if self.cleanup_due() {
            self.clean_old_events(cancel).await;
        }
        let result = self.process(cancel).await;

        if let Err(e) = handle.release().await {
            tracing::warn!(lock = %lock_name, error = %e, "failed to release inbox processor lock");
        }
        result
    }

    fn cleanup_due(&self) -> bool {
        let last = self.last_cleanup.load(Ordering::Acquire);
        if last == NEVER_CLEANED {
            return true;
        }
        let interval = i64::try_from(self.options.clean_old_event_time_interval.as_millis())
            .unwrap_or(i64::MAX);
        self.clock.now().timestamp_millis().saturating_sub(last) >= interval
    }

    /// Purges expired processed events in a unit of work of its own. A failure
    /// is logged and retried next cycle; it never blocks event handling.
    async fn clean_old_events(&self, cancel: &CancellationToken) {
        let started = self.clock.now();
        let purged = async {
            let mut uow = self.inbox.begin().await?;
            let purged = self.inbox.delete_old_events(&mut uow, cancel).await?;
            uow.commit().await?;
            Ok::<_, eventboxes_core::error::StoreError>(purged)
        }
        .await;

        match purged {
            Ok(count) => {
                self.last_cleanup
                    .store(started.timestamp_millis(), Ordering::Release);
                tracing::info!(inbox = %self.name, purged = count, "old inbox events purged");
            }
            Err(e) => {
                tracing::warn!(inbox = %self.name, error = %e, "inbox cleanup failed");
            }
        }
    }

    async fn process(&self, cancel: &CancellationToken) -> Result<CycleOutcome, ProcessingError> {
        let mut uow = self.inbox.begin().await?;
        let events = self
            .inbox
            .get_waiting_events(
                &mut uow,
                self.options.inbox_waiting_event_max_count,
                self.options.inbox_processor_filter.as_ref(),
                cancel,
            )
            .await?;

        if events.is_empty() {
            uow.commit().await?;
            return Ok(CycleOutcome::IDLE);
        }
        tracing::debug!(inbox = %self.name, count = events.len(), "handling incoming events");

        let mut processed = 0;
        let mut failed = 0;
        let mut cancelled = false;
        for event in &events {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.dispatch(event).await {
                Ok(()) => {
                    self.inbox.mark_as_processed(&mut uow, event.id).await?;
                    processed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        inbox = %self.name,
                        event_id = %event.id,
                        event_name = %event.event_name,
                        error = %e,
                        "event handling failed, event stays waiting"
                    );
                    failed += 1;
                }
            }
        }
        uow.commit().await?;

        if cancelled {
            return Err(ProcessingError::Cancelled);
        }
        tracing::debug!(inbox = %self.name, processed, failed, "inbox cycle finished");
        Ok(CycleOutcome::Completed { processed, failed })
    }

    /// Runs every handler registered for the event and reports the first
    /// failure, if any.
    async fn dispatch(&self, event: &IncomingEventInfo) -> Result<(), HandlerError> {
        let handlers = self.registry.handlers_for(&event.event_name);
        if handlers.is_empty() {
            tracing::debug!(
                event_id = %event.id,
                event_name = %event.event_name,
                "no handler registered, marking processed"
            );
            return Ok(());
        }

        let mut first_error = None;
        for handler in handlers {
            if let Err(e) = handler.handle(event).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
