//! HTTP transport: posts outgoing events to another service's ingestion
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use eventboxes_core::error::PublishError;
use eventboxes_core::event::OutgoingEventInfo;
use eventboxes_core::publisher::EventPublisher;

use crate::envelope::EventEnvelope;

/// Publishes event pages as JSON envelopes over HTTP.
///
/// A page is accepted or refused as a whole by the receiver, which stores it
/// in a single transaction and acknowledges redeliveries as duplicates.
#[derive(Debug, Clone)]
pub struct HttpEventPublisher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEventPublisher {
    /// Creates a publisher posting to `endpoint` (for example
    /// `http://billing:3000/api/v1/inbox/events`).
    ///
    /// # Errors
    ///
    /// Returns the client build error if the TLS backend cannot be
    /// initialised.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The URL events are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, event: &OutgoingEventInfo) -> Result<(), PublishError> {
        self.publish_many(std::slice::from_ref(event)).await
    }

    async fn publish_many(&self, events: &[OutgoingEventInfo]) -> Result<(), PublishError> {
        let envelope = EventEnvelope::from_outgoing(events);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(endpoint = %self.endpoint, count = events.len(), "Events delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(PublishError::Rejected(format!("{status}: {body}")))
    }
}
