//! Event records held by the inbox and the outbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open key/value bag attached to every event record.
pub type ExtraProperties = serde_json::Map<String, serde_json::Value>;

/// Extra property key carrying the tenant an event belongs to.
pub const TENANT_ID_PROPERTY: &str = "TenantId";

/// An event waiting in the outbox to be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEventInfo {
    /// Unique event identifier.
    pub id: Uuid,
    /// Name used by consumers to route the event.
    pub event_name: String,
    /// Opaque serialized payload.
    pub event_data: Vec<u8>,
    /// Ordering key; pages are drained oldest first.
    pub creation_time: DateTime<Utc>,
    /// Additional properties travelling with the event.
    pub extra_properties: ExtraProperties,
}

impl OutgoingEventInfo {
    /// Creates an outgoing event with an empty property bag.
    #[must_use]
    pub fn new(
        id: Uuid,
        event_name: impl Into<String>,
        event_data: Vec<u8>,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_name: event_name.into(),
            event_data,
            creation_time,
            extra_properties: ExtraProperties::new(),
        }
    }

    /// Returns a copy of `self` with `key` set to `value` in the property bag.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }
}

/// An event received from the transport, waiting for local handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEventInfo {
    /// Unique event identifier.
    pub id: Uuid,
    /// Delivery identity assigned by the sender; unique per inbox.
    pub message_id: String,
    /// Name used to resolve local handlers.
    pub event_name: String,
    /// Opaque serialized payload.
    pub event_data: Vec<u8>,
    /// Ordering key; pages are drained oldest first.
    pub creation_time: DateTime<Utc>,
    /// Additional properties travelling with the event.
    pub extra_properties: ExtraProperties,
}

impl IncomingEventInfo {
    /// Creates an incoming event with an empty property bag.
    #[must_use]
    pub fn new(
        id: Uuid,
        message_id: impl Into<String>,
        event_name: impl Into<String>,
        event_data: Vec<u8>,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            message_id: message_id.into(),
            event_name: event_name.into(),
            event_data,
            creation_time,
            extra_properties: ExtraProperties::new(),
        }
    }

    /// Returns a copy of `self` with `key` set to `value` in the property bag.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }

    /// Deserializes the JSON payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not valid JSON for `T`.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.event_data)
    }
}
