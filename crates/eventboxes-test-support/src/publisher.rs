//! Test publishers: `EventPublisher` implementations for tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventboxes_core::error::PublishError;
use eventboxes_core::event::OutgoingEventInfo;
use eventboxes_core::publisher::EventPublisher;
use tokio::sync::Notify;
use uuid::Uuid;

/// One call made to a [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishCall {
    /// `publish` with the event id.
    Single(Uuid),
    /// `publish_many` with the event ids in call order.
    Batch(Vec<Uuid>),
}

/// A publisher that records every call and fails for configured event names.
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    calls: Arc<Mutex<Vec<PublishCall>>>,
    failing_names: Arc<Mutex<HashSet<String>>>,
}

impl RecordingPublisher {
    /// Creates a publisher that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call carrying an event named `event_name` fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_on(&self, event_name: &str) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(event_name.to_owned());
    }

    /// Returns a snapshot of all calls, including failed ones.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }

    fn rejects(&self, event: &OutgoingEventInfo) -> bool {
        self.failing_names.lock().unwrap().contains(&event.event_name)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &OutgoingEventInfo) -> Result<(), PublishError> {
        self.calls.lock().unwrap().push(PublishCall::Single(event.id));
        if self.rejects(event) {
            return Err(PublishError::Rejected(event.event_name.clone()));
        }
        Ok(())
    }

    async fn publish_many(&self, events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push(PublishCall::Batch(events.iter().map(|e| e.id).collect()));
        if let Some(rejected) = events.iter().find(|e| self.rejects(e)) {
            return Err(PublishError::Rejected(rejected.event_name.clone()));
        }
        Ok(())
    }
}

/// A publisher whose transport is always down.
#[derive(Debug)]
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: &OutgoingEventInfo) -> Result<(), PublishError> {
        Err(PublishError::Transport("broker unreachable".into()))
    }

    async fn publish_many(&self, _events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        Err(PublishError::Transport("broker unreachable".into()))
    }
}

/// A publisher that parks every call until the test opens the gate. Used to
/// hold a cycle in the middle of its critical section.
#[derive(Debug, Clone, Default)]
pub struct GatedPublisher {
    entered: Arc<Notify>,
    gate: Arc<Notify>,
}

impl GatedPublisher {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once a publish call is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Lets one parked (or the next) publish call through.
    pub fn open(&self) {
        self.gate.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.gate.notified().await;
    }
}

#[async_trait]
impl EventPublisher for GatedPublisher {
    async fn publish(&self, _event: &OutgoingEventInfo) -> Result<(), PublishError> {
        self.pass().await;
        Ok(())
    }

    async fn publish_many(&self, _events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        self.pass().await;
        Ok(())
    }
}
