//! In-memory stores: `EventOutbox` and `EventInbox` implementations for tests.
//!
//! Writes are staged in an [`InMemoryUnitOfWork`] and only reach the shared
//! state on commit, so rollback and drop-without-commit behave like a real
//! database transaction. Reads inside a unit of work see its own staged
//! writes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use eventboxes_core::clock::Clock;
use eventboxes_core::error::StoreError;
use eventboxes_core::event::{IncomingEventInfo, OutgoingEventInfo};
use eventboxes_core::filter::{IncomingEventField, OutgoingEventField, Predicate};
use eventboxes_core::inbox::EventInbox;
use eventboxes_core::outbox::EventOutbox;
use eventboxes_core::uow::UnitOfWork;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct IncomingRecord {
    event: IncomingEventInfo,
    processed_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct BoxState {
    outgoing: Vec<OutgoingEventInfo>,
    incoming: Vec<IncomingRecord>,
}

#[derive(Debug, Clone)]
enum StagedOp {
    InsertOutgoing(OutgoingEventInfo),
    DeleteOutgoing(Uuid),
    InsertIncoming(IncomingEventInfo),
    MarkProcessed(Uuid, DateTime<Utc>),
    DeleteIncoming(Uuid),
}

impl BoxState {
    fn apply(&mut self, op: StagedOp) -> Result<(), StoreError> {
        match op {
            StagedOp::InsertOutgoing(event) => self.outgoing.push(event),
            StagedOp::DeleteOutgoing(id) => self.outgoing.retain(|e| e.id != id),
            StagedOp::InsertIncoming(event) => {
                if self
                    .incoming
                    .iter()
                    .any(|r| r.event.message_id == event.message_id)
                {
                    return Err(StoreError::DuplicateMessage(event.message_id));
                }
                self.incoming.push(IncomingRecord {
                    event,
                    processed_time: None,
                });
            }
            StagedOp::MarkProcessed(id, at) => {
                for record in self.incoming.iter_mut().filter(|r| r.event.id == id) {
                    record.processed_time = Some(at);
                }
            }
            StagedOp::DeleteIncoming(id) => self.incoming.retain(|r| r.event.id != id),
        }
        Ok(())
    }
}

/// A staged transaction over an in-memory store.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    state: Arc<Mutex<BoxState>>,
    pending: Vec<StagedOp>,
}

impl InMemoryUnitOfWork {
    fn new(state: Arc<Mutex<BoxState>>) -> Self {
        Self {
            state,
            pending: Vec::new(),
        }
    }

    /// Committed state with this unit of work's staged writes applied.
    fn view(&self) -> Result<BoxState, StoreError> {
        let mut view = self.state.lock().unwrap().clone();
        for op in &self.pending {
            view.apply(op.clone())?;
        }
        Ok(view)
    }

    fn stage(&mut self, op: StagedOp) {
        self.pending.push(op);
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut next = state.clone();
        for op in self.pending {
            next.apply(op)?;
        }
        *state = next;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), StoreError> {
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    Ok(())
}

/// An in-memory outbox. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventOutbox {
    state: Arc<Mutex<BoxState>>,
    fail_deletes: bool,
}

impl InMemoryEventOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an outbox sharing `self`'s contents whose deletes always fail.
    #[must_use]
    pub fn with_failing_deletes(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            fail_deletes: true,
        }
    }

    /// Inserts `events` as already committed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed(&self, events: impl IntoIterator<Item = OutgoingEventInfo>) {
        self.state.lock().unwrap().outgoing.extend(events);
    }

    /// Returns all committed events, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn committed_events(&self) -> Vec<OutgoingEventInfo> {
        let mut events = self.state.lock().unwrap().outgoing.clone();
        events.sort_by_key(|e| (e.creation_time, e.id));
        events
    }
}

#[async_trait]
impl EventOutbox for InMemoryEventOutbox {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork, StoreError> {
        Ok(InMemoryUnitOfWork::new(Arc::clone(&self.state)))
    }

    async fn enqueue(
        &self,
        uow: &mut InMemoryUnitOfWork,
        event: &OutgoingEventInfo,
    ) -> Result<(), StoreError> {
        uow.stage(StagedOp::InsertOutgoing(event.clone()));
        Ok(())
    }

    async fn get_waiting_events(
        &self,
        uow: &mut InMemoryUnitOfWork,
        max_count: usize,
        filter: Option<&Predicate<OutgoingEventField>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<OutgoingEventInfo>, StoreError> {
        check_cancelled(cancel)?;
        if let Some(filter) = filter {
            filter.validate()?;
        }
        let mut events: Vec<OutgoingEventInfo> = uow
            .view()?
            .outgoing
            .into_iter()
            .filter(|e| filter.is_none_or(|f| f.matches(e)))
            .collect();
        events.sort_by_key(|e| (e.creation_time, e.id));
        events.truncate(max_count);
        Ok(events)
    }

    async fn delete(&self, uow: &mut InMemoryUnitOfWork, id: Uuid) -> Result<(), StoreError> {
        if self.fail_deletes {
            return Err(StoreError::Database("delete failed".into()));
        }
        uow.stage(StagedOp::DeleteOutgoing(id));
        Ok(())
    }

    async fn delete_many(
        &self,
        uow: &mut InMemoryUnitOfWork,
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        check_cancelled(cancel)?;
        if self.fail_deletes {
            return Err(StoreError::Database("delete failed".into()));
        }
        for id in ids {
            uow.stage(StagedOp::DeleteOutgoing(*id));
        }
        Ok(())
    }
}

/// An in-memory inbox. Clones share the same contents.
#[derive(Clone)]
pub struct InMemoryEventInbox {
    state: Arc<Mutex<BoxState>>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl std::fmt::Debug for InMemoryEventInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventInbox")
            .field("state", &self.state)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl InMemoryEventInbox {
    /// Creates an empty inbox that stamps processing times with `clock` and
    /// purges processed events older than `retention`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoxState::default())),
            clock,
            retention,
        }
    }

    /// Inserts `events` as already committed and unprocessed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned or a message id repeats.
    pub fn seed(&self, events: impl IntoIterator<Item = IncomingEventInfo>) {
        let mut state = self.state.lock().unwrap();
        for event in events {
            state.apply(StagedOp::InsertIncoming(event)).unwrap();
        }
    }

    /// Returns all committed events with their processing time, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn committed_events(&self) -> Vec<(IncomingEventInfo, Option<DateTime<Utc>>)> {
        let mut records = self.state.lock().unwrap().incoming.clone();
        records.sort_by_key(|r| (r.event.creation_time, r.event.id));
        records
            .into_iter()
            .map(|r| (r.event, r.processed_time))
            .collect()
    }

    /// Returns whether the committed event `id` is processed, or `None` if it
    /// is not stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_processed(&self, id: Uuid) -> Option<bool> {
        self.state
            .lock()
            .unwrap()
            .incoming
            .iter()
            .find(|r| r.event.id == id)
            .map(|r| r.processed_time.is_some())
    }
}

#[async_trait]
impl EventInbox for InMemoryEventInbox {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork, StoreError> {
        Ok(InMemoryUnitOfWork::new(Arc::clone(&self.state)))
    }

    async fn enqueue(
        &self,
        uow: &mut InMemoryUnitOfWork,
        event: &IncomingEventInfo,
    ) -> Result<(), StoreError> {
        if uow
            .view()?
            .incoming
            .iter()
            .any(|r| r.event.message_id == event.message_id)
        {
            return Err(StoreError::DuplicateMessage(event.message_id.clone()));
        }
        uow.stage(StagedOp::InsertIncoming(event.clone()));
        Ok(())
    }

    async fn get_waiting_events(
        &self,
        uow: &mut InMemoryUnitOfWork,
        max_count: usize,
        filter: Option<&Predicate<IncomingEventField>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<IncomingEventInfo>, StoreError> {
        check_cancelled(cancel)?;
        if let Some(filter) = filter {
            filter.validate()?;
        }
        let mut events: Vec<IncomingEventInfo> = uow
            .view()?
            .incoming
            .into_iter()
            .filter(|r| r.processed_time.is_none())
            .map(|r| r.event)
            .filter(|e| filter.is_none_or(|f| f.matches(e)))
            .collect();
        events.sort_by_key(|e| (e.creation_time, e.id));
        events.truncate(max_count);
        Ok(events)
    }

    async fn mark_as_processed(
        &self,
        uow: &mut InMemoryUnitOfWork,
        id: Uuid,
    ) -> Result<(), StoreError> {
        uow.stage(StagedOp::MarkProcessed(id, self.clock.now()));
        Ok(())
    }

    async fn exists_by_message_id(
        &self,
        uow: &mut InMemoryUnitOfWork,
        message_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(uow
            .view()?
            .incoming
            .iter()
            .any(|r| r.event.message_id == message_id))
    }

    async fn delete_old_events(
        &self,
        uow: &mut InMemoryUnitOfWork,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        check_cancelled(cancel)?;
        let retention = TimeDelta::from_std(self.retention)
            .map_err(|e| StoreError::Database(format!("invalid retention window: {e}")))?;
        let cutoff = self.clock.now() - retention;
        let expired: Vec<Uuid> = uow
            .view()?
            .incoming
            .iter()
            .filter(|r| r.processed_time.is_some_and(|at| at < cutoff))
            .map(|r| r.event.id)
            .collect();
        for id in &expired {
            uow.stage(StagedOp::DeleteIncoming(*id));
        }
        Ok(expired.len() as u64)
    }
}

/// A unit of work that holds nothing; used by the failing stores.
#[derive(Debug)]
pub struct NoopUnitOfWork;

#[async_trait]
impl UnitOfWork for NoopUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn connection_refused() -> StoreError {
    StoreError::Database("connection refused".into())
}

/// An outbox whose every operation fails with a database error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventOutbox;

#[async_trait]
impl EventOutbox for FailingEventOutbox {
    type UnitOfWork = NoopUnitOfWork;

    async fn begin(&self) -> Result<NoopUnitOfWork, StoreError> {
        Ok(NoopUnitOfWork)
    }

    async fn enqueue(
        &self,
        _uow: &mut NoopUnitOfWork,
        _event: &OutgoingEventInfo,
    ) -> Result<(), StoreError> {
        Err(connection_refused())
    }

    async fn get_waiting_events(
        &self,
        _uow: &mut NoopUnitOfWork,
        _max_count: usize,
        _filter: Option<&Predicate<OutgoingEventField>>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<OutgoingEventInfo>, StoreError> {
        Err(connection_refused())
    }

    async fn delete(&self, _uow: &mut NoopUnitOfWork, _id: Uuid) -> Result<(), StoreError> {
        Err(connection_refused())
    }

    async fn delete_many(
        &self,
        _uow: &mut NoopUnitOfWork,
        _ids: &[Uuid],
        _cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        Err(connection_refused())
    }
}

/// An inbox whose every operation fails with a database error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventInbox;

#[async_trait]
impl EventInbox for FailingEventInbox {
    type UnitOfWork = NoopUnitOfWork;

    async fn begin(&self) -> Result<NoopUnitOfWork, StoreError> {
        Ok(NoopUnitOfWork)
    }

    async fn enqueue(
        &self,
        _uow: &mut NoopUnitOfWork,
        _event: &IncomingEventInfo,
    ) -> Result<(), StoreError> {
        Err(connection_refused())
    }

    async fn get_waiting_events(
        &self,
        _uow: &mut NoopUnitOfWork,
        _max_count: usize,
        _filter: Option<&Predicate<IncomingEventField>>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<IncomingEventInfo>, StoreError> {
        Err(connection_refused())
    }

    async fn mark_as_processed(
        &self,
        _uow: &mut NoopUnitOfWork,
        _id: Uuid,
    ) -> Result<(), StoreError> {
        Err(connection_refused())
    }

    async fn exists_by_message_id(
        &self,
        _uow: &mut NoopUnitOfWork,
        _message_id: &str,
    ) -> Result<bool, StoreError> {
        Err(connection_refused())
    }

    async fn delete_old_events(
        &self,
        _uow: &mut NoopUnitOfWork,
        _cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        Err(connection_refused())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap()
    }

    fn outgoing(hour: u32) -> OutgoingEventInfo {
        OutgoingEventInfo::new(Uuid::new_v4(), "E", vec![], at(hour))
    }

    #[tokio::test]
    async fn test_outbox_enqueue_is_invisible_until_commit_and_discarded_on_drop() {
        let outbox = InMemoryEventOutbox::new();
        let cancel = CancellationToken::new();

        let mut uow = outbox.begin().await.unwrap();
        outbox.enqueue(&mut uow, &outgoing(1)).await.unwrap();
        assert!(outbox.committed_events().is_empty());
        drop(uow);

        let mut uow = outbox.begin().await.unwrap();
        let waiting = outbox
            .get_waiting_events(&mut uow, 10, None, &cancel)
            .await
            .unwrap();
        assert!(waiting.is_empty());
    }

    #[tokio::test]
    async fn test_inbox_commit_rejects_duplicate_staged_concurrently() {
        let clock = ManualClock::new(at(1));
        let inbox = InMemoryEventInbox::new(Arc::new(clock), Duration::from_secs(60));
        let event = |id| IncomingEventInfo::new(id, "m1", "E", vec![], at(1));

        let mut first = inbox.begin().await.unwrap();
        let mut second = inbox.begin().await.unwrap();
        inbox.enqueue(&mut first, &event(Uuid::new_v4())).await.unwrap();
        inbox.enqueue(&mut second, &event(Uuid::new_v4())).await.unwrap();

        first.commit().await.unwrap();
        let result = second.commit().await;

        assert!(matches!(result, Err(StoreError::DuplicateMessage(m)) if m == "m1"));
        assert_eq!(inbox.committed_events().len(), 1);
    }
}
