//! Periodic background jobs driving the outbox sender and inbox processor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventboxes_core::error::ProcessingError;
use eventboxes_core::inbox::EventInbox;
use eventboxes_core::lock::DistributedLock;
use eventboxes_core::outbox::EventOutbox;
use eventboxes_core::publisher::EventPublisher;
use eventboxes_delivery::application::inbox_processor::InboxProcessor;
use eventboxes_delivery::application::outbox_sender::OutboxSender;
use eventboxes_delivery::domain::outcome::CycleOutcome;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A unit of work run once per period.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> String;

    /// Runs one cycle.
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, ProcessingError>;
}

#[async_trait]
impl<O, P, L> PeriodicJob for OutboxSender<O, P, L>
where
    O: EventOutbox + 'static,
    P: EventPublisher + 'static,
    L: DistributedLock + 'static,
{
    fn name(&self) -> String {
        self.lock_name()
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, ProcessingError> {
        OutboxSender::run_cycle(self, cancel).await
    }
}

#[async_trait]
impl<I, L> PeriodicJob for InboxProcessor<I, L>
where
    I: EventInbox + 'static,
    L: DistributedLock + 'static,
{
    fn name(&self) -> String {
        self.lock_name()
    }

    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, ProcessingError> {
        InboxProcessor::run_cycle(self, cancel).await
    }
}

/// Shortest period a job runs at; shorter periods, zero included, are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Runs `job` every `period` until `cancel` fires.
///
/// A cycle that overruns its period delays the next one instead of bursting.
/// Cycle errors are logged and retried on the next tick.
pub fn spawn(job: Arc<dyn PeriodicJob>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = job.name();
        if period < MIN_PERIOD {
            tracing::warn!(job = %name, period_ms = period.as_millis(), "Period too short, using 1ms");
        }
        let period = period.max(MIN_PERIOD);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(job = %name, period_ms = period.as_millis(), "Job started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match job.run_cycle(&cancel).await {
                Ok(CycleOutcome::Skipped) => {
                    tracing::debug!(job = %name, "Lock held elsewhere, cycle skipped");
                }
                Ok(CycleOutcome::Completed { processed: 0, failed: 0 }) => {}
                Ok(CycleOutcome::Completed { processed, failed }) => {
                    tracing::info!(job = %name, processed, failed, "Cycle completed");
                }
                Err(ProcessingError::Cancelled) => break,
                Err(e) => {
                    tracing::warn!(job = %name, error = %e, "Cycle failed");
                }
            }
        }

        tracing::info!(job = %name, "Job stopped");
    })
}
