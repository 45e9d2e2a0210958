//! `PostgreSQL` implementation of the `EventOutbox` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventboxes_core::error::StoreError;
use eventboxes_core::event::{ExtraProperties, OutgoingEventInfo};
use eventboxes_core::filter::{OutgoingEventField, Predicate};
use eventboxes_core::outbox::EventOutbox;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db_error;
use crate::filter::{OutgoingColumns, push_predicate};
use crate::uow::PgUnitOfWork;

#[derive(Debug, sqlx::FromRow)]
struct OutgoingEventRow {
    id: Uuid,
    event_name: String,
    event_data: Vec<u8>,
    creation_time: DateTime<Utc>,
    extra_properties: Json<ExtraProperties>,
}

impl From<OutgoingEventRow> for OutgoingEventInfo {
    fn from(row: OutgoingEventRow) -> Self {
        Self {
            id: row.id,
            event_name: row.event_name,
            event_data: row.event_data,
            creation_time: row.creation_time,
            extra_properties: row.extra_properties.0,
        }
    }
}

/// PostgreSQL-backed outbox.
#[derive(Debug, Clone)]
pub struct PgEventOutbox {
    pool: PgPool,
}

impl PgEventOutbox {
    /// Creates a new `PgEventOutbox`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventOutbox for PgEventOutbox {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, StoreError> {
        PgUnitOfWork::begin(&self.pool).await
    }

    async fn enqueue(
        &self,
        uow: &mut PgUnitOfWork,
        event: &OutgoingEventInfo,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO outgoing_events
                (id, event_name, event_data, creation_time, extra_properties)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(event.id)
        .bind(&event.event_name)
        .bind(&event.event_data)
        .bind(event.creation_time)
        .bind(Json(&event.extra_properties))
        .execute(uow.connection())
        .await
        .map_err(db_error)?;

        tracing::debug!(event_id = %event.id, event_name = %event.event_name, "outgoing event enqueued");
        Ok(())
    }

    async fn get_waiting_events(
        &self,
        uow: &mut PgUnitOfWork,
        max_count: usize,
        filter: Option<&Predicate<OutgoingEventField>>,
        cancel: &CancellationToken,
    ) -> Result<Vec<OutgoingEventInfo>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, event_name, event_data, creation_time, extra_properties FROM outgoing_events",
        );
        if let Some(filter) = filter {
            filter.validate()?;
            qb.push(" WHERE ");
            push_predicate(&mut qb, &filter.transform::<OutgoingColumns>());
        }
        qb.push(" ORDER BY creation_time, id LIMIT ");
        qb.push_bind(i64::try_from(max_count).unwrap_or(i64::MAX));

        let rows: Vec<OutgoingEventRow> = qb
            .build_query_as()
            .fetch_all(uow.connection())
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(OutgoingEventInfo::from).collect())
    }

    async fn delete(&self, uow: &mut PgUnitOfWork, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM outgoing_events WHERE id = $1")
            .bind(id)
            .execute(uow.connection())
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_many(
        &self,
        uow: &mut PgUnitOfWork,
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if ids.is_empty() {
            return Ok(());
        }

        let result = sqlx::query("DELETE FROM outgoing_events WHERE id = ANY($1)")
            .bind(ids)
            .execute(uow.connection())
            .await
            .map_err(db_error)?;

        tracing::debug!(
            requested = ids.len(),
            deleted = result.rows_affected(),
            "outgoing events deleted"
        );
        Ok(())
    }
}
