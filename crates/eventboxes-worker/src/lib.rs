//! Event Boxes worker.
//!
//! Hosts the periodic outbox sender and inbox processor, the HTTP transport
//! between services (publisher and ingestion endpoint), configuration and
//! telemetry. The binary runs it with an empty handler registry; services
//! embedding the worker pass their own.

pub mod app;
pub mod config;
pub mod envelope;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod transport;
