//! Periodic processors and the producer/consumer entry points.

pub mod inbox_processor;
pub mod ingestion;
pub mod loopback;
pub mod outbox_publisher;
pub mod outbox_sender;
