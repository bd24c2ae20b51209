//! Vacancy alerts and their delivery
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      NotificationManager                   │
//! │  - Alert rendering                         │
//! │  - Channel fan-out                         │
//! │  - Failure logging                         │
//! └────────────────────────────────────────────┘
//!                     │
//!             ┌───────┴───────┐
//!             ▼               ▼
//!       ┌─────────┐     ┌─────────┐
//!       │ Webhook │     │   Log   │
//!       │ Channel │     │ Channel │
//!       └─────────┘     └─────────┘
//! ```
//!
//! Delivery problems never propagate out of the manager: the caller records
//! the vacancy as notified either way.
//!
//! # Example
//!
//! ```rust,ignore
//! use roomwatch::notifications::{NotificationManager, LogChannel};
//!
//! let mut manager = NotificationManager::new().with_recipient("me@example.com");
//! manager.add_channel(Box::new(LogChannel::new()));
//! manager.notify(&record).await;
//! ```

pub mod channels;
mod manager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

use crate::models::VacancyRecord;

// Re-exports
pub use channels::log::LogChannel;
pub use channels::webhook::{WebhookChannel, WebhookConfig};
pub use channels::{Channel, ChannelError, ChannelResult, DeliveryStatus};
pub use manager::NotificationManager;

const BODY_RULE: &str = "----------------------------------------";

/// A rendered alert for one newly listed vacancy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyAlert {
    /// Unique alert identifier
    pub id: String,

    /// Destination address, if one is configured
    pub recipient: Option<String>,

    pub subject: String,

    pub body: String,

    /// The vacancy this alert announces
    pub vacancy: VacancyRecord,

    pub created_at: DateTime<Utc>,
}

impl VacancyAlert {
    /// Render the alert for `record`
    pub fn new(record: &VacancyRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient: None,
            subject: Self::render_subject(record),
            body: Self::render_body(record),
            vacancy: record.clone(),
            created_at: Utc::now(),
        }
    }

    /// Set the destination address
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    fn render_subject(record: &VacancyRecord) -> String {
        format!(
            "Vacancy Alert: {} - {} Available!",
            record.share_house_name, record.room_type
        )
    }

    fn render_body(record: &VacancyRecord) -> String {
        let mut body = String::new();
        body.push_str("A new vacancy has been detected.\n\n");
        body.push_str("Details:\n");
        body.push_str(BODY_RULE);
        body.push('\n');
        let _ = writeln!(body, "Share House: {}", record.share_house_name);
        let _ = writeln!(body, "Vacancy ID: {}", record.vacancy_id);
        let _ = writeln!(body, "URL: {}", record.url);
        let _ = writeln!(body, "Room Type: {}", record.room_type);
        let _ = writeln!(body, "Status: {}", record.status);
        let _ = writeln!(body, "Detected at: {}", record.observed_at_display());
        body.push_str(BODY_RULE);
        body.push_str("\n\n");
        body.push_str("Open the link above to view the listing.\n");
        body
    }
}
