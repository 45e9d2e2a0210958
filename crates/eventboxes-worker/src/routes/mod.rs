//! HTTP routes.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod inbox;

/// Returns the full route tree.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/inbox", inbox::router())
}
