//! `PostgreSQL` transaction scope.

use async_trait::async_trait;
use eventboxes_core::error::StoreError;
use eventboxes_core::uow::UnitOfWork;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::db_error;

/// A database transaction shared by store operations and the caller's own
/// business writes. Dropping it without committing rolls it back.
#[derive(Debug)]
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    /// Starts a transaction on a connection from `pool`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if no connection can be acquired.
    pub async fn begin(pool: &PgPool) -> Result<Self, StoreError> {
        let tx = pool.begin().await.map_err(db_error)?;
        Ok(Self { tx })
    }

    /// The connection the transaction runs on, for the caller's own queries.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.tx
    }
}

impl From<Transaction<'static, Postgres>> for PgUnitOfWork {
    fn from(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error)
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(db_error)
    }
}
