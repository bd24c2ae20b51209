//! Log channel
//!
//! Writes each alert through `tracing`; useful when no relay is configured.

use async_trait::async_trait;

use super::{Channel, ChannelResult, DeliveryStatus};
use crate::notifications::VacancyAlert;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

impl LogChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, alert: &VacancyAlert) -> ChannelResult<DeliveryStatus> {
        tracing::info!(
            alert_id = %alert.id,
            to = alert.recipient.as_deref().unwrap_or("-"),
            subject = %alert.subject,
            "{}",
            alert.body
        );
        Ok(DeliveryStatus::success("log"))
    }
}
