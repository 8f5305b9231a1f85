use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::error::NotificationError;
use crate::models::OutboundMessage;

/// Where outbound patient messages are handed off.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotificationError>;
}

/// Transactional mail API: `POST {MAIL_API_URL}` with a JSON message and a
/// bearer token.
pub struct HttpMailer {
    client: Client,
    url: String,
    token: String,
}

impl HttpMailer {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.mail_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build mail client, using defaults: {}", e);
                Client::new()
            });
        Self {
            client,
            url: config.mail_api_url.clone(),
            token: config.mail_api_token.clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for HttpMailer {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotificationError> {
        debug!("Posting mail to {} for {}", self.url, message.to);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::Delivery(format!("mail API returned {}: {}", status, body)))
    }
}

/// Used when no mail API is configured.
pub struct LogMailer;

#[async_trait]
impl NotificationSink for LogMailer {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "mail not configured; message logged only");
        Ok(())
    }
}
