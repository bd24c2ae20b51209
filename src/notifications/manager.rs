//! Notification manager for alert fan-out

use super::channels::log::LogChannel;
use super::channels::webhook::{WebhookChannel, WebhookConfig};
use super::channels::{Channel, ChannelResult, DeliveryStatus};
use super::VacancyAlert;
use crate::config::NotifyConfig;
use crate::models::VacancyRecord;

/// Renders vacancy alerts and hands them to every registered channel
#[derive(Default)]
pub struct NotificationManager {
    /// Registered notification channels
    channels: Vec<Box<dyn Channel>>,

    /// Address stamped on every alert
    recipient: Option<String>,
}

impl NotificationManager {
    /// Create a manager with no channels
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the channel set described by configuration
    pub fn from_config(config: &NotifyConfig) -> ChannelResult<Self> {
        let mut manager = Self::new();
        manager.recipient = config.recipient.clone().filter(|r| !r.trim().is_empty());

        if let Some(url) = &config.webhook_url {
            let mut webhook = WebhookConfig::new(url).with_timeout(config.timeout_secs);
            if let Some(token) = &config.webhook_token {
                webhook = webhook.with_auth_token(token);
            }
            manager.add_channel(Box::new(WebhookChannel::new(webhook)?));
        }

        if config.log_alerts {
            manager.add_channel(Box::new(LogChannel::new()));
        }

        Ok(manager)
    }

    /// Set the alert recipient
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Add a notification channel
    pub fn add_channel(&mut self, channel: Box<dyn Channel>) {
        self.channels.push(channel);
    }

    /// Number of registered channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Announce a newly listed vacancy on every channel
    ///
    /// Never fails; each channel's outcome is logged and returned.
    pub async fn notify(&self, record: &VacancyRecord) -> Vec<DeliveryStatus> {
        let mut alert = VacancyAlert::new(record);
        if let Some(recipient) = &self.recipient {
            alert = alert.with_recipient(recipient);
        }

        if self.channels.is_empty() {
            tracing::warn!(
                vacancy_id = %record.vacancy_id,
                "No notification channels configured, alert dropped"
            );
            return Vec::new();
        }

        tracing::info!(
            vacancy_id = %record.vacancy_id,
            share_house = %record.share_house_name,
            to = alert.recipient.as_deref().unwrap_or("-"),
            "Sending vacancy alert"
        );

        let mut statuses = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let status = match channel.send(&alert).await {
                Ok(status) => status,
                Err(e) => DeliveryStatus::failure(channel.name(), e.to_string()),
            };

            if status.success {
                tracing::debug!(channel = channel.name(), "Alert delivered");
            } else {
                tracing::error!(
                    channel = channel.name(),
                    vacancy_id = %record.vacancy_id,
                    error = status.message.as_deref().unwrap_or("unknown"),
                    "Failed to deliver vacancy alert"
                );
            }
            statuses.push(status);
        }

        statuses
    }
}
