//! Event Boxes worker entry point.

use std::error::Error;

use eventboxes_delivery::domain::registry::EventHandlerRegistry;
use eventboxes_worker::app;
use eventboxes_worker::config::Config;
use eventboxes_worker::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    let telemetry = telemetry::init("eventboxes-worker", otlp_endpoint.as_deref())?;

    tracing::info!("Starting Event Boxes worker");

    let result = match Config::from_env() {
        Ok(config) => app::serve(config, EventHandlerRegistry::default()).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        tracing::error!(error = %e, "Worker stopped with an error");
    }

    telemetry.shutdown();
    Ok(result?)
}
