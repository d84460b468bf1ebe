use std::time::Duration;

use reqwest::Client;
use reviva_core::config::NotificationConfig;
use reviva_core::{DomainEvent, EventSink, EventSinkError};
use secrecy::{ExposeSecret, SecretString};
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Relays domain events to an HTTP endpoint as JSON.
///
/// Delivery runs on the tokio runtime after `publish` returns; a slow or
/// failing endpoint never holds up the booking operation that raised the event.
#[derive(Clone)]
pub struct WebhookEventSink {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookEventSink {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into(), token })
    }

    /// Builds a sink when a webhook URL is configured.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(url) = config.webhook_url.as_deref() else {
            return Ok(None);
        };
        Self::new(url, config.webhook_token.clone(), Duration::from_secs(config.timeout_secs))
            .map(Some)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn deliver(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("x-reviva-event", event.event_name())
            .json(event);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|error| EventSinkError::Unavailable(format!("webhook request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(EventSinkError::Rejected(format!(
                "webhook endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

impl EventSink for WebhookEventSink {
    fn name(&self) -> &str {
        "webhook"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), EventSinkError> {
        let handle = Handle::try_current().map_err(|_| {
            EventSinkError::Unavailable("no async runtime available for webhook delivery".into())
        })?;

        let sink = self.clone();
        let event = event.clone();
        handle.spawn(async move {
            match sink.deliver(&event).await {
                Ok(()) => info!(
                    event_name = "notifications.webhook_delivered",
                    ticket_id = %event.ticket_id(),
                    domain_event = event.event_name(),
                    "webhook notification delivered"
                ),
                Err(error) => warn!(
                    event_name = "notifications.webhook_failed",
                    ticket_id = %event.ticket_id(),
                    domain_event = event.event_name(),
                    error = %error,
                    "webhook notification failed"
                ),
            }
        });

        Ok(())
    }
}
