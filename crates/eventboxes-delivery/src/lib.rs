//! Event Boxes delivery.
//!
//! Drains the outbox to a message transport, receives transported events into
//! the inbox with deduplication, and drains the inbox to local handlers.

pub mod application;
pub mod domain;
