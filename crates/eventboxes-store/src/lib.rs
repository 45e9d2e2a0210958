//! `PostgreSQL` implementations of the inbox, the outbox and the distributed
//! lock.

pub mod filter;
pub mod inbox;
pub mod lock;
pub mod outbox;
pub mod schema;
pub mod uow;

use eventboxes_core::error::StoreError;

/// Converts a `sqlx` error into a [`StoreError`].
pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(err.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}
