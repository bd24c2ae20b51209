//! Mail relay channel
//!
//! Posts each alert as JSON to an HTTP endpoint that turns it into an email.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Channel, ChannelError, ChannelResult, DeliveryStatus};
use crate::notifications::VacancyAlert;

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Relay endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            timeout_secs: default_timeout(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Mail relay channel
///
/// # Payload Format
///
/// ```json
/// {
///   "to": "me@example.com",
///   "subject": "Vacancy Alert: Oak House Shibuya - Apartment Available!",
///   "body": "A new vacancy has been detected...",
///   "vacancy": {
///     "vacancy_id": "room-204",
///     "url": "https://www.oakhouse.jp/eng/house/1067",
///     "share_house_name": "Oak House Shibuya",
///     "room_type": "Apartment",
///     "status": "vacancy",
///     "observed_at": "2024-03-10T08:15:00"
///   }
/// }
/// ```
///
/// Each alert is attempted once; a failed delivery is reported, not retried.
pub struct WebhookChannel {
    config: WebhookConfig,
    client: Client,
}

impl WebhookChannel {
    /// Create a new webhook channel
    pub fn new(config: WebhookConfig) -> ChannelResult<Self> {
        config.validate().map_err(ChannelError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Create a simple webhook channel with just a URL
    pub fn from_url(url: impl Into<String>) -> ChannelResult<Self> {
        Self::new(WebhookConfig::new(url))
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_payload(&self, alert: &VacancyAlert) -> serde_json::Value {
        serde_json::json!({
            "to": alert.recipient,
            "subject": alert.subject,
            "body": alert.body,
            "vacancy": alert.vacancy,
        })
    }

    async fn post(&self, payload: &serde_json::Value) -> ChannelResult<()> {
        let mut request = self.client.post(&self.config.url);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.json(payload).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &VacancyAlert) -> ChannelResult<DeliveryStatus> {
        let payload = self.build_payload(alert);

        match self.post(&payload).await {
            Ok(()) => {
                tracing::info!(
                    url = %self.config.url,
                    vacancy_id = %alert.vacancy.vacancy_id,
                    "Alert delivered to relay"
                );
                Ok(DeliveryStatus::success_with_message(
                    "webhook",
                    format!("Delivered to {}", self.config.url),
                ))
            }
            Err(e) => Ok(DeliveryStatus::failure("webhook", e.to_string())),
        }
    }
}
