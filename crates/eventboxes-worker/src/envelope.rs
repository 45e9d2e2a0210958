//! JSON wire format shared by the HTTP publisher and the ingestion endpoint.
//!
//! Payload bytes travel base64-encoded so that any serialization, not only
//! JSON, survives the trip.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use eventboxes_core::event::{ExtraProperties, OutgoingEventInfo};
use eventboxes_delivery::application::ingestion::IncomingMessage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A batch of events on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Events in publish order.
    pub events: Vec<WireEvent>,
}

/// One event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Outgoing event id; becomes the receiver's message id.
    pub id: Uuid,
    /// Event name.
    pub event_name: String,
    /// Base64-encoded payload.
    pub event_data: String,
    /// Creation time at the sender. Informational only: the receiver stamps
    /// its own receive time and orders processing by it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    /// Properties travelling with the event.
    #[serde(default)]
    pub extra_properties: ExtraProperties,
}

/// Body answered by the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Events stored for processing.
    pub accepted: usize,
    /// Events already received earlier.
    pub duplicates: usize,
}

impl EventEnvelope {
    /// Builds an envelope carrying `events`.
    #[must_use]
    pub fn from_outgoing(events: &[OutgoingEventInfo]) -> Self {
        Self {
            events: events.iter().map(WireEvent::from).collect(),
        }
    }
}

impl From<&OutgoingEventInfo> for WireEvent {
    fn from(event: &OutgoingEventInfo) -> Self {
        Self {
            id: event.id,
            event_name: event.event_name.clone(),
            event_data: STANDARD.encode(&event.event_data),
            creation_time: Some(event.creation_time),
            extra_properties: event.extra_properties.clone(),
        }
    }
}

impl WireEvent {
    /// Decodes the payload into a message for the ingestor.
    ///
    /// # Errors
    ///
    /// Returns the decode error if `event_data` is not valid base64.
    pub fn into_message(self) -> Result<IncomingMessage, base64::DecodeError> {
        Ok(IncomingMessage {
            message_id: self.id.to_string(),
            event_name: self.event_name,
            event_data: STANDARD.decode(self.event_data)?,
            extra_properties: self.extra_properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_envelope_json_shape() {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let id = Uuid::nil();
        let event = OutgoingEventInfo::new(id, "OrderCreated", b"hi".to_vec(), now)
            .with_property("TenantId", "tenant-a");

        let json = serde_json::to_value(EventEnvelope::from_outgoing(&[event])).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "events": [{
                    "id": "00000000-0000-0000-0000-000000000000",
                    "event_name": "OrderCreated",
                    "event_data": "aGk=",
                    "creation_time": "2026-01-15T10:00:00Z",
                    "extra_properties": { "TenantId": "tenant-a" }
                }]
            })
        );
    }

    #[test]
    fn test_wire_event_decodes_into_message_keyed_by_id() {
        let id = Uuid::new_v4();
        let wire = WireEvent {
            id,
            event_name: "OrderCreated".into(),
            event_data: "aGk=".into(),
            creation_time: Some(Utc::now()),
            extra_properties: ExtraProperties::new(),
        };

        let message = wire.into_message().unwrap();

        assert_eq!(message.message_id, id.to_string());
        assert_eq!(message.event_data, b"hi".to_vec());
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let wire = WireEvent {
            id: Uuid::new_v4(),
            event_name: "OrderCreated".into(),
            event_data: "not base64!".into(),
            creation_time: Some(Utc::now()),
            extra_properties: ExtraProperties::new(),
        };

        assert!(wire.into_message().is_err());
    }

    #[test]
    fn test_missing_extra_properties_default_to_empty() {
        let wire: WireEvent = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "event_name": "OrderCreated",
            "event_data": "",
            "creation_time": "2026-01-15T10:00:00Z"
        }))
        .unwrap();

        assert!(wire.extra_properties.is_empty());
    }

    #[test]
    fn test_creation_time_is_optional_and_not_carried_into_the_message() {
        // Arrange
        let wire: WireEvent = serde_json::from_value(serde_json::json!({
            "id": Uuid::nil(),
            "event_name": "OrderCreated",
            "event_data": "aGk="
        }))
        .unwrap();

        // Act
        let message = wire.clone().into_message().unwrap();

        // Assert
        assert_eq!(wire.creation_time, None);
        assert_eq!(
            message,
            IncomingMessage {
                message_id: Uuid::nil().to_string(),
                event_name: "OrderCreated".into(),
                event_data: b"hi".to_vec(),
                extra_properties: ExtraProperties::new(),
            }
        );
    }
}
