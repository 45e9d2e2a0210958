//! Distributed lock abstraction.
//!
//! Periodic jobs take a named lock before touching a store so that, across all
//! instances of a horizontally scaled service, at most one drains a given
//! store at a time.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockError;

/// Proof of holding a named lock. Dropping the handle frees the lock.
#[async_trait]
pub trait LockHandle: Send {
    /// Frees the lock.
    async fn release(self) -> Result<(), LockError>;
}

/// Cross-process mutual exclusion backed by shared storage.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// The handle returned on successful acquisition.
    type Handle: LockHandle;

    /// Tries to take the lock called `name`, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` if another holder kept the lock for the whole wait.
    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
    ) -> Result<Option<Self::Handle>, LockError>;
}
