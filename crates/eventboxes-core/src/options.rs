//! Tuning options for the outbox sender and inbox processor.

use std::time::Duration;

use crate::error::FilterError;
use crate::filter::{IncomingEventField, OutgoingEventField, Predicate};

/// Options shared by the inbox processor and the outbox sender.
#[derive(Debug, Clone)]
pub struct BoxesOptions {
    /// How often the inbox processor purges old processed events.
    pub clean_old_event_time_interval: Duration,
    /// Maximum number of incoming events handled per cycle.
    pub inbox_waiting_event_max_count: usize,
    /// Narrows the incoming events the processor picks up; `None` takes all.
    pub inbox_processor_filter: Option<Predicate<IncomingEventField>>,
    /// Maximum number of outgoing events published per cycle.
    pub outbox_waiting_event_max_count: usize,
    /// Narrows the outgoing events the sender picks up; `None` takes all.
    pub outbox_processor_filter: Option<Predicate<OutgoingEventField>>,
    /// Period of both jobs.
    pub period: Duration,
    /// How long a job waits for its distributed lock before skipping a cycle.
    pub distributed_lock_wait_duration: Duration,
    /// How long processed incoming events are kept before being purged.
    pub wait_time_to_delete_processed_inbox_events: Duration,
    /// Publish each page of outgoing events in a single transport call.
    pub batch_publish_outbox_events: bool,
}

impl Default for BoxesOptions {
    fn default() -> Self {
        Self {
            clean_old_event_time_interval: Duration::from_secs(6 * 60 * 60),
            inbox_waiting_event_max_count: 1000,
            inbox_processor_filter: None,
            outbox_waiting_event_max_count: 1000,
            outbox_processor_filter: None,
            period: Duration::from_secs(2),
            distributed_lock_wait_duration: Duration::from_secs(15),
            wait_time_to_delete_processed_inbox_events: Duration::from_secs(2 * 60 * 60),
            batch_publish_outbox_events: true,
        }
    }
}

impl BoxesOptions {
    /// Checks both processor filters for literals that do not fit their
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns the first `FilterError` found.
    pub fn validate(&self) -> Result<(), FilterError> {
        if let Some(filter) = &self.inbox_processor_filter {
            filter.validate()?;
        }
        if let Some(filter) = &self.outbox_processor_filter {
            filter.validate()?;
        }
        Ok(())
    }
}
