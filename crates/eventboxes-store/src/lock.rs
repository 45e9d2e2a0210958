//! `PostgreSQL` advisory-lock implementation of the `DistributedLock` trait.
//!
//! Locks are transaction-scoped (`pg_try_advisory_xact_lock`): the handle owns
//! the transaction that took the lock, and the lock is freed when that
//! transaction ends. A holder that crashes or drops its handle therefore never
//! leaves the lock behind.

use std::time::Duration;

use async_trait::async_trait;
use eventboxes_core::error::LockError;
use eventboxes_core::lock::{DistributedLock, LockHandle};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Derives the 64-bit advisory lock key for `name`. Stable across processes
/// and releases.
#[must_use]
pub fn lock_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

fn provider_error(err: sqlx::Error) -> LockError {
    LockError::Provider(err.to_string())
}

/// Distributed lock backed by `PostgreSQL` advisory locks.
#[derive(Debug, Clone)]
pub struct PgDistributedLock {
    pool: PgPool,
}

impl PgDistributedLock {
    /// Creates a new `PgDistributedLock`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Handle for a held advisory lock.
#[derive(Debug)]
pub struct PgLockHandle {
    name: String,
    tx: Transaction<'static, Postgres>,
}

impl PgLockHandle {
    /// The name the lock was taken under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl LockHandle for PgLockHandle {
    async fn release(self) -> Result<(), LockError> {
        self.tx.rollback().await.map_err(provider_error)?;
        tracing::debug!(lock = %self.name, "advisory lock released");
        Ok(())
    }
}

#[async_trait]
impl DistributedLock for PgDistributedLock {
    type Handle = PgLockHandle;

    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
    ) -> Result<Option<PgLockHandle>, LockError> {
        let key = lock_key(name);
        let deadline = Instant::now() + wait;

        loop {
            let mut tx = self.pool.begin().await.map_err(provider_error)?;
            let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
                .bind(key)
                .fetch_one(&mut *tx)
                .await
                .map_err(provider_error)?;

            if acquired {
                tracing::debug!(lock = %name, key, "advisory lock acquired");
                return Ok(Some(PgLockHandle {
                    name: name.to_owned(),
                    tx,
                }));
            }
            tx.rollback().await.map_err(provider_error)?;

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_stable_and_name_sensitive() {
        assert_eq!(lock_key("outbox-sender:default"), lock_key("outbox-sender:default"));
        assert_ne!(lock_key("outbox-sender:default"), lock_key("inbox-processor:default"));
    }
}
