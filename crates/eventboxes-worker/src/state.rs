//! Shared application state.

use std::sync::Arc;

use eventboxes_delivery::application::ingestion::EventIngestor;
use eventboxes_store::inbox::PgEventInbox;
use sqlx::PgPool;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub db_pool: PgPool,
    /// Stores transported events in the local inbox.
    pub ingestor: Arc<EventIngestor<PgEventInbox>>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(db_pool: PgPool, ingestor: Arc<EventIngestor<PgEventInbox>>) -> Self {
        Self { db_pool, ingestor }
    }
}
