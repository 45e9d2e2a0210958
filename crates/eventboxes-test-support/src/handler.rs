//! Test handlers: `EventHandler` implementations for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eventboxes_core::error::HandlerError;
use eventboxes_core::event::IncomingEventInfo;
use eventboxes_core::handler::EventHandler;
use uuid::Uuid;

/// A handler that records the ids of every event it handles. Clones share the
/// same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    handled: Arc<Mutex<Vec<Uuid>>>,
}

impl RecordingHandler {
    /// Creates a handler with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids handled so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn handled(&self) -> Vec<Uuid> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &IncomingEventInfo) -> Result<(), HandlerError> {
        self.handled.lock().unwrap().push(event.id);
        Ok(())
    }
}

/// A handler that always fails and counts its attempts. Clones share the count.
#[derive(Debug, Clone, Default)]
pub struct FailingHandler {
    attempts: Arc<Mutex<Vec<Uuid>>>,
}

impl FailingHandler {
    /// Creates a handler with no attempts recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids of every attempted event, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn attempts(&self) -> Vec<Uuid> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for FailingHandler {
    async fn handle(&self, event: &IncomingEventInfo) -> Result<(), HandlerError> {
        self.attempts.lock().unwrap().push(event.id);
        Err(HandlerError::Failed(format!(
            "cannot handle {}",
            event.event_name
        )))
    }
}
