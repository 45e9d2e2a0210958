//! Explicit transaction scopes.
//!
//! Every store operation takes the unit of work it runs in. A unit of work is
//! obtained from the store, passed to as many operations as the caller needs
//! (business writes included), and ended with [`UnitOfWork::commit`] or
//! [`UnitOfWork::rollback`]. Dropping an unfinished unit of work rolls it
//! back, so an early return through `?` never leaks partial writes.

use async_trait::async_trait;

use crate::error::StoreError;

/// A transaction scope that must be explicitly committed.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Makes every write done in this scope durable.
    async fn commit(self) -> Result<(), StoreError>;

    /// Discards every write done in this scope.
    async fn rollback(self) -> Result<(), StoreError>;
}
