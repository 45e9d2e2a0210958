//! Error types shared by the stores, processors and transports.

use thiserror::Error;

use crate::filter::ValueKind;

/// Errors raised by the event stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A persistence error (connection, query, transaction).
    #[error("database error: {0}")]
    Database(String),

    /// An incoming event with this message id is already stored.
    #[error("duplicate message id: {0}")]
    DuplicateMessage(String),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation observed a cancellation request before starting.
    #[error("operation cancelled")]
    Cancelled,

    /// The filter passed to a query cannot be evaluated.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),
}

/// Errors raised when a filter does not fit the fields it compares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A literal's type differs from the type of its field.
    #[error("{field} holds {expected} values but is compared with a {found} value")]
    TypeMismatch {
        /// The compared field.
        field: String,
        /// What the field holds.
        expected: ValueKind,
        /// What the literal is.
        found: ValueKind,
    },
}

/// Errors raised by a distributed lock provider.
///
/// Failing to obtain the lock within the wait duration is not an error; it is
/// reported as `Ok(None)` by [`crate::lock::DistributedLock::try_acquire`].
#[derive(Debug, Error)]
pub enum LockError {
    /// The backing store of the lock failed.
    #[error("lock provider error: {0}")]
    Provider(String),
}

/// Errors raised while handing events to the message transport.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The transport could not be reached or failed mid-request.
    #[error("transport error: {0}")]
    Transport(String),

    /// The transport answered but refused the events.
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Errors raised by local event handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event payload could not be decoded into the handler's type.
    #[error("event payload could not be decoded: {0}")]
    Deserialization(String),

    /// The handler ran and failed.
    #[error("handler failed: {0}")]
    Failed(String),
}

/// Errors that abort a whole processing cycle.
///
/// Per-event failures (publish or handler) never surface here; they are
/// logged and the affected events stay waiting.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The store failed while fetching, deleting or marking events.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The lock provider failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The cycle was cancelled before it could finish.
    #[error("processing cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}
