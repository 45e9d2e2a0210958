//! Result of one processing cycle.

/// What a single sender or processor cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The distributed lock was held elsewhere for the whole wait.
    Skipped,
    /// The cycle ran under the lock.
    Completed {
        /// Events published (outbox) or handled (inbox).
        processed: usize,
        /// Events left waiting after a publish or handler failure.
        failed: usize,
    },
}

impl CycleOutcome {
    /// A completed cycle that found nothing to do.
    pub const IDLE: Self = Self::Completed {
        processed: 0,
        failed: 0,
    };
}
