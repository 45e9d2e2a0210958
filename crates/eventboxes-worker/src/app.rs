//! Worker assembly and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use eventboxes_core::clock::{Clock, SystemClock};
use eventboxes_core::publisher::EventPublisher;
use eventboxes_delivery::application::inbox_processor::InboxProcessor;
use eventboxes_delivery::application::ingestion::EventIngestor;
use eventboxes_delivery::application::loopback::LoopbackPublisher;
use eventboxes_delivery::application::outbox_sender::OutboxSender;
use eventboxes_delivery::domain::registry::EventHandlerRegistry;
use eventboxes_store::inbox::PgEventInbox;
use eventboxes_store::lock::PgDistributedLock;
use eventboxes_store::outbox::PgEventOutbox;
use eventboxes_store::schema::MIGRATOR;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppError;
use crate::jobs;
use crate::routes;
use crate::state::AppState;
use crate::transport::HttpEventPublisher;

/// Box name used for the lock names of the worker's sender and processor.
pub const DEFAULT_BOX_NAME: &str = "default";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP application around `state`.
pub fn build_router(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the worker until SIGINT or SIGTERM: migrates the schema, starts the
/// outbox sender and inbox processor jobs and serves the HTTP endpoints.
/// Incoming events are dispatched to `registry`.
///
/// # Errors
///
/// Returns `AppError` if the database is unreachable, migrations fail, the
/// publisher cannot be built or the server cannot bind.
pub async fn serve(config: Config, registry: EventHandlerRegistry) -> Result<(), AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    tracing::info!("Database migrations applied");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let options = config.options.clone();
    let inbox = PgEventInbox::new(
        pool.clone(),
        Arc::clone(&clock),
        options.wait_time_to_delete_processed_inbox_events,
    );
    let outbox = PgEventOutbox::new(pool.clone());
    let ingestor = Arc::new(EventIngestor::new(inbox.clone(), Arc::clone(&clock)));

    let publisher: Arc<dyn EventPublisher> = match &config.publish_url {
        Some(url) => {
            tracing::info!(endpoint = %url, "Publishing outgoing events over HTTP");
            Arc::new(
                HttpEventPublisher::new(url.clone(), config.publish_timeout)
                    .map_err(|e| AppError::Config(format!("invalid publisher: {e}")))?,
            )
        }
        None => {
            tracing::info!("No publish URL configured, delivering outgoing events locally");
            Arc::new(LoopbackPublisher::new(EventIngestor::new(
                inbox.clone(),
                Arc::clone(&clock),
            )))
        }
    };

    let sender = OutboxSender::new(
        DEFAULT_BOX_NAME,
        outbox,
        publisher,
        PgDistributedLock::new(pool.clone()),
        options.clone(),
    );
    let processor = InboxProcessor::new(
        DEFAULT_BOX_NAME,
        inbox,
        PgDistributedLock::new(pool.clone()),
        registry,
        clock,
        options.clone(),
    );

    let cancel = CancellationToken::new();
    let handles = vec![
        jobs::spawn(Arc::new(sender), options.period, cancel.clone()),
        jobs::spawn(Arc::new(processor), options.period, cancel.clone()),
    ];

    let app = build_router(AppState::new(pool, ingestor));
    let addr = config.bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    tracing::info!("HTTP server stopped, stopping jobs");
    cancel.cancel();
    await_shutdown(handles).await;

    served?;
    Ok(())
}

async fn await_shutdown(handles: Vec<JoinHandle<()>>) {
    for (idx, handle) in handles.into_iter().enumerate() {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
            Ok(Ok(())) => tracing::info!(job = idx, "Job stopped gracefully"),
            Ok(Err(e)) => tracing::warn!(job = idx, error = %e, "Job task failed"),
            Err(_) => tracing::warn!(job = idx, "Job shutdown timed out"),
        }
    }
}

/// Resolves on Ctrl+C, SIGTERM or when `cancel` fires.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
        () = cancel.cancelled() => {}
    }
}
