//! `PostgreSQL` implementation of the `EventInbox` trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use eventboxes_core::clock::Clock;
use eventboxes_core::error::StoreError;
use eventboxes_core::event::{ExtraProperties, IncomingEventInfo};
use eventboxes_core::filter::{IncomingEventField, Predicate};
use eventboxes_core::inbox::EventInbox;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db_error;
use crate::filter::{IncomingColumns, push_predicate};
use crate::uow::PgUnitOfWork;

#[derive(Debug, sqlx::FromRow)]
struct IncomingEventRow {
    id: Uuid,
    message_id: String,
    event_name: String,
    event_data: Vec<u8>,
    creation_time: DateTime<Utc>,
    extra_properties: Json<ExtraProperties>,
}

impl From<IncomingEventRow> for IncomingEventInfo {
    fn from(row: IncomingEventRow) -> Self {
        Self {
            id: row.id,
            message_id: row.message_id,
            event_name: row.event_name,
            event_data: row.event_data,
            creation_time: row.creation_time,
            extra_properties: row.extra_properties.0,
        }
    }
}

/// PostgreSQL-backed inbox.
#[derive(Clone)]
pub struct PgEventInbox {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl std::fmt::Debug for PgEventInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgEventInbox")
            .field("pool", &self.pool)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}

impl PgEventInbox {
    /// Creates a new `PgEventInbox` that stamps processing times with `clock`
    /// and keeps processed events for `retention` before purging them.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            pool,
            clock,
            retention,
        }
    }
}

#[async_trait]
impl EventInbox for PgEventInbox {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        PgUnitOfWork::begin(&self.pool).await
    }

    async fn enqueue(
        &self,
        uow: &mut PgUnitOfWork,
        event: &IncomingEventInfo,
    ) -> Result<(), StoreError> {
        // ON CONFLICT keeps the surrounding transaction usable after a duplicate.
        let result = sqlx::query(
            r"
            INSERT INTO incoming_events
                (id, message_id, event_name, event_data, creation_time, extra_properties)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (message_id) DO NOTHING
            ",
        )
        .bind(event.id)
        .bind(&event.message_id)
        .bind(&event.event_name)
        .bind(&event.event_data)
        .bind(event.creation_time)
        .bind(Json(&event.extra_properties))
        .execute(uow.connection())
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateMessage(event.message_id.clone()));
        }

        tracing::debug!(
            event_id = %event.id,
            message_id = %event.message_id,
            event_name = %event.event_name,
            "incoming event enqueued"
        );
        Ok(())
    }

    async fn get_waiting_events(
        &self,
        uow: &mut PgUnitOfWork,
        max_count: usize,
        filter: Option<&Predicate<IncomingEventField>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<IncomingEventInfo>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, message_id, event_name, event_data, creation_time, extra_properties \
             FROM incoming_events WHERE NOT is_processed",
        );
        if let Some(filter) = filter {
            filter.validate()?;
            qb.push(" AND ");
            push_predicate(&mut qb, &filter.transform::<IncomingColumns>());
        }
        qb.push(" ORDER BY creation_time, id LIMIT ");
        qb.push_bind(i64::try_from(max_count).unwrap_or(i64::MAX));

        let rows: Vec<IncomingEventRow> = qb
            .build_query_as()
            .fetch_all(uow.connection())
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(IncomingEventInfo::from).collect())
    }

    async fn mark_as_processed(
        &self,
        uow: &mut PgUnitOfWork,
        id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE incoming_events SET is_processed = TRUE, processed_time = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(self.clock.now())
        .execute(uow.connection())
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn exists_by_message_id(
        &self,
        uow: &mut PgUnitOfWork,
        message_id: &str,
    ) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM incoming_events WHERE message_id = $1)")
            .bind(message_id)
            .fetch_one(uow.connection())
            .await
            .map_err(db_error)
    }

    async fn delete_old_events(
        &self,
        uow: &mut PgUnitOfWork,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let retention = TimeDelta::from_std(self.retention)
            .map_err(|e| StoreError::Database(format!("invalid retention window: {e}")))?;
        let cutoff = self.clock.now() - retention;

        let result = sqlx::query(
            "DELETE FROM incoming_events WHERE is_processed AND processed_time < $1",
        )
        .bind(cutoff)
        .execute(uow.connection())
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}
