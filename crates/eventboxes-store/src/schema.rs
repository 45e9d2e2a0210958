//! Event box database schema.

use sqlx::migrate::Migrator;

/// Table holding events waiting to be published.
pub const OUTGOING_EVENTS_TABLE: &str = "outgoing_events";

/// Table holding received events.
pub const INCOMING_EVENTS_TABLE: &str = "incoming_events";

/// Migrations creating both tables and their indexes.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");
