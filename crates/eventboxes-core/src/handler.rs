//! Local event handler abstraction consumed by the inbox processor.

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::event::IncomingEventInfo;

/// Handles incoming events of one or more event names.
///
/// The inbox processor may invoke a handler more than once for the same event
/// (after a partial failure), so handlers must be idempotent.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles `event`.
    async fn handle(&self, event: &IncomingEventInfo) -> Result<(), HandlerError>;
}
