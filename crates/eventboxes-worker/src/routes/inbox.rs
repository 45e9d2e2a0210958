//! Ingestion endpoint: the receiving side of the HTTP transport.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{Json, Router, routing::post};
use eventboxes_core::uow::UnitOfWork;
use eventboxes_delivery::application::ingestion::Ingested;

use crate::envelope::{EventEnvelope, IngestResponse, WireEvent};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/v1/inbox/events
///
/// Stores every event of the envelope in one transaction. Events seen before
/// are counted as duplicates and not stored again.
async fn receive_events(
    State(state): State<AppState>,
    payload: Result<Json<EventEnvelope>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(envelope) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let messages = envelope
        .events
        .into_iter()
        .map(WireEvent::into_message)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::BadRequest(format!("event_data is not valid base64: {e}")))?;

    let mut uow = state.ingestor.begin().await?;
    let mut response = IngestResponse {
        accepted: 0,
        duplicates: 0,
    };
    for message in messages {
        match state.ingestor.receive(&mut uow, message).await? {
            Ingested::Accepted(_) => response.accepted += 1,
            Ingested::Duplicate => response.duplicates += 1,
        }
    }
    uow.commit().await?;

    tracing::debug!(
        accepted = response.accepted,
        duplicates = response.duplicates,
        "events received"
    );
    Ok(Json(response))
}

/// Returns the router for the inbox ingestion endpoint.
pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(receive_events))
}
