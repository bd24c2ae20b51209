// Core data structures for the roomwatch pipeline

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status value stamped on every extracted record
pub const VACANCY_STATUS: &str = "vacancy";

/// Share-house name used when a page carries no title element
pub const UNKNOWN_SHARE_HOUSE: &str = "Unknown";

/// Format used when rendering local timestamps
pub const LOCAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One vacancy observed on one page during one cycle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VacancyRecord {
    pub vacancy_id: String,
    pub url: String,
    pub share_house_name: String,
    pub room_type: String,
    pub status: String,
    pub observed_at: NaiveDateTime,
}

impl VacancyRecord {
    /// Identity used by the store and the tracker
    pub fn key(&self) -> VacancyKey {
        VacancyKey::new(&self.vacancy_id, &self.share_house_name)
    }

    /// Detection timestamp in ISO-8601 local form
    pub fn observed_at_display(&self) -> String {
        self.observed_at.format(LOCAL_TIMESTAMP_FORMAT).to_string()
    }

    /// Compare everything except `observed_at`
    pub fn same_listing(&self, other: &Self) -> bool {
        self.vacancy_id == other.vacancy_id
            && self.url == other.url
            && self.share_house_name == other.share_house_name
            && self.room_type == other.room_type
            && self.status == other.status
    }
}

/// Composite vacancy identity: element id scoped by share-house name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VacancyKey {
    pub vacancy_id: String,
    pub share_house_name: String,
}

impl VacancyKey {
    pub fn new(vacancy_id: impl Into<String>, share_house_name: impl Into<String>) -> Self {
        Self {
            vacancy_id: vacancy_id.into(),
            share_house_name: share_house_name.into(),
        }
    }
}

impl fmt::Display for VacancyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.vacancy_id, self.share_house_name)
    }
}

/// Durable "already notified" entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifiedVacancy {
    pub vacancy_id: String,
    pub share_house_name: String,
    pub url: String,
    pub room_type: String,
    pub first_notified_at: NaiveDateTime,
    pub last_seen_at: NaiveDateTime,
    pub notification_count: u32,
}

impl NotifiedVacancy {
    /// Fresh entry for a record that has just been notified
    pub fn from_record(record: &VacancyRecord) -> Self {
        let now = Local::now().naive_local();
        Self {
            vacancy_id: record.vacancy_id.clone(),
            share_house_name: record.share_house_name.clone(),
            url: record.url.clone(),
            room_type: record.room_type.clone(),
            first_notified_at: now,
            last_seen_at: now,
            notification_count: 1,
        }
    }

    pub fn key(&self) -> VacancyKey {
        VacancyKey::new(&self.vacancy_id, &self.share_house_name)
    }
}

/// Lifecycle of one target URL within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetState {
    Pending,
    Fetched,
    Extracted,
    Failed,
    Done,
}

impl TargetState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }

    /// Allowed forward transitions; `Done` is terminal
    pub fn can_advance_to(&self, next: TargetState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fetched)
                | (Self::Pending, Self::Failed)
                | (Self::Fetched, Self::Extracted)
                | (Self::Extracted, Self::Done)
                | (Self::Failed, Self::Done)
        )
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-target outcome of a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetReport {
    pub url: String,
    pub state: TargetState,
    /// Whether the target reached `Done` through `Failed`
    pub failed: bool,
    pub records: usize,
    pub notified: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

impl TargetReport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: TargetState::Pending,
            failed: false,
            records: 0,
            notified: 0,
            skipped: 0,
            error: None,
        }
    }

    /// Move to `next`, ignoring transitions the state machine does not allow
    pub fn advance(&mut self, next: TargetState) -> bool {
        if self.state.can_advance_to(next) {
            if next == TargetState::Failed {
                self.failed = true;
            }
            self.state = next;
            true
        } else {
            tracing::debug!(
                url = %self.url,
                from = %self.state,
                to = %next,
                "Ignoring invalid target state transition"
            );
            false
        }
    }
}

/// Result of one full scrape cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: String,
    pub targets_processed: usize,
    pub targets_failed: usize,
    pub records_observed: usize,
    pub new_notifications: usize,
    pub forgotten: usize,
    pub active_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: Vec<TargetReport>,
}

impl CycleSummary {
    /// Wall-clock duration of the cycle
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cycle {}", self.cycle_id)?;
        writeln!(f, "{:-<40}", "")?;
        writeln!(
            f,
            "Targets: {} processed, {} failed",
            self.targets_processed, self.targets_failed
        )?;
        writeln!(f, "Records observed: {}", self.records_observed)?;
        writeln!(f, "New notifications: {}", self.new_notifications)?;
        writeln!(f, "Forgotten: {}", self.forgotten)?;
        write!(f, "Active vacancies: {}", self.active_count)
    }
}
