//! Test locks: `DistributedLock` implementations for tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use eventboxes_core::error::LockError;
use eventboxes_core::lock::{DistributedLock, LockHandle};
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A process-local named lock. Clones share the same set of held names, which
/// stands in for the shared storage of a real provider.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDistributedLock {
    held: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryDistributedLock {
    /// Creates a lock with nothing held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` is currently held.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().unwrap().contains(name)
    }
}

/// Handle for [`InMemoryDistributedLock`]; frees the name on drop.
#[derive(Debug)]
pub struct InMemoryLockHandle {
    name: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InMemoryLockHandle {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.name);
        }
    }
}

#[async_trait]
impl LockHandle for InMemoryLockHandle {
    async fn release(self) -> Result<(), LockError> {
        drop(self);
        Ok(())
    }
}

#[async_trait]
impl DistributedLock for InMemoryDistributedLock {
    type Handle = InMemoryLockHandle;

    async fn try_acquire(
        &self,
        name: &str,
        wait: Duration,
    ) -> Result<Option<InMemoryLockHandle>, LockError> {
        let deadline = Instant::now() + wait;
        loop {
            if self.held.lock().unwrap().insert(name.to_owned()) {
                return Ok(Some(InMemoryLockHandle {
                    name: name.to_owned(),
                    held: Arc::clone(&self.held),
                }));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// A lock whose provider is always down.
#[derive(Debug)]
pub struct FailingDistributedLock;

#[async_trait]
impl DistributedLock for FailingDistributedLock {
    type Handle = InMemoryLockHandle;

    async fn try_acquire(
        &self,
        _name: &str,
        _wait: Duration,
    ) -> Result<Option<InMemoryLockHandle>, LockError> {
        Err(LockError::Provider("lock store unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_times_out_while_held() {
        let lock = InMemoryDistributedLock::new();

        let handle = lock.try_acquire("job", Duration::ZERO).await.unwrap();
        let second = lock
            .try_acquire("job", Duration::from_millis(20))
            .await
            .unwrap();

        assert!(handle.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_release_frees_the_name() {
        let lock = InMemoryDistributedLock::new();

        let handle = lock.try_acquire("job", Duration::ZERO).await.unwrap().unwrap();
        handle.release().await.unwrap();

        assert!(!lock.is_held("job"));
        assert!(lock.try_acquire("job", Duration::ZERO).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_different_names_do_not_contend() {
        let lock = InMemoryDistributedLock::new();

        let a = lock.try_acquire("a", Duration::ZERO).await.unwrap();
        let b = lock.try_acquire("b", Duration::ZERO).await.unwrap();

        assert!(a.is_some());
        assert!(b.is_some());
    }
}
