//! Test fixtures for integration tests
//!
//! Provides listing markup builders and substitutable collaborators for the
//! scrape cycle.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomwatch::crawler::{PageFetcher, ScrapeCycle};
use roomwatch::models::{NotifiedVacancy, VacancyKey, VacancyRecord};
use roomwatch::notifications::{
    Channel, ChannelError, ChannelResult, DeliveryStatus, NotificationManager, VacancyAlert,
};
use roomwatch::parser::VacancyExtractor;
use roomwatch::storage::{
    MemoryVacancyStore, ReconcilePolicy, SharedVacancyStore, VacancyStore, VacancyTracker,
};
use roomwatch::utils::error::FetchError;

pub const PAGE_A: &str = "https://www.oakhouse.jp/eng/house/1067";
pub const PAGE_B: &str = "https://www.oakhouse.jp/eng/house/2210";

/// One label/value entry
pub fn entry(label: &str, value: &str) -> String {
    format!(
        r#"<li class="u-pc_only has-label"><strong>{label}</strong><span>{value}</span></li>"#
    )
}

/// A vacancy-flagged room element
pub fn vacancy(id: &str, room_type: &str) -> String {
    format!(
        r#"<div class="room" id="{id}" data-status="vacancy"><ul>{}{}</ul></div>"#,
        entry("Rent", "68,000 yen"),
        entry("Room type", room_type)
    )
}

/// A room element that is not vacant
pub fn occupied(id: &str) -> String {
    format!(
        r#"<div class="room" id="{id}" data-status="full"><ul>{}</ul></div>"#,
        entry("Room type", "Apartment")
    )
}

/// A full listing page
pub fn listing(house: &str, rooms: &[String]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{house}</title></head>
<body>
  <h1 class="p-description__name">{house}</h1>
  <section class="rooms">{}</section>
</body>
</html>"#,
        rooms.join("\n")
    )
}

// ============================================================================
// Fetcher
// ============================================================================

/// Serves canned pages; unknown or failed URLs answer with a 503
#[derive(Default)]
pub struct StubFetcher {
    pages: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_page(&self, url: &str, html: String) {
        self.failing.lock().unwrap().remove(url);
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(url) {
            return Err(FetchError::ServerError(503));
        }

        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::ServerError(503))
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Captures every alert; can be switched to fail
#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub alerts: Arc<Mutex<Vec<VacancyAlert>>>,
    pub failing: Arc<AtomicBool>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn vacancy_ids(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.vacancy.vacancy_id.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &VacancyAlert) -> ChannelResult<DeliveryStatus> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::InvalidConfig("mail server down".to_string()));
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(DeliveryStatus::success("recording"))
    }
}

// ============================================================================
// Store
// ============================================================================

/// In-memory store whose writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryVacancyStore,
    pub fail_inserts: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl VacancyStore for FlakyStore {
    fn exists(&self, key: &VacancyKey) -> anyhow::Result<bool> {
        self.inner.exists(key)
    }

    fn insert(&self, record: &VacancyRecord) -> anyhow::Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.inner.insert(record)
    }

    fn delete_by_id(&self, key: &VacancyKey) -> anyhow::Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.inner.delete_by_id(key)
    }

    fn all_ids(&self) -> anyhow::Result<HashSet<VacancyKey>> {
        self.inner.all_ids()
    }

    fn count(&self) -> anyhow::Result<usize> {
        self.inner.count()
    }

    fn get(&self, key: &VacancyKey) -> anyhow::Result<Option<NotifiedVacancy>> {
        self.inner.get(key)
    }

    fn list(&self) -> anyhow::Result<Vec<NotifiedVacancy>> {
        self.inner.list()
    }

    fn touch(&self, key: &VacancyKey) -> anyhow::Result<bool> {
        self.inner.touch(key)
    }
}

// ============================================================================
// Cycle assembly
// ============================================================================

/// Build a cycle over `targets` with a recording channel
pub fn build_cycle(
    fetcher: Arc<StubFetcher>,
    store: SharedVacancyStore,
    channel: &RecordingChannel,
    targets: &[&str],
    policy: ReconcilePolicy,
) -> ScrapeCycle {
    let mut notifier = NotificationManager::new().with_recipient("tenant@example.com");
    notifier.add_channel(Box::new(channel.clone()));

    let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();

    ScrapeCycle::new(
        fetcher,
        VacancyExtractor::new(),
        VacancyTracker::new(store, policy),
        notifier,
        &targets,
    )
}

/// Sorted vacancy ids currently tracked
pub fn tracked_ids(store: &dyn VacancyStore) -> Vec<String> {
    let mut ids: Vec<String> = store
        .all_ids()
        .unwrap()
        .into_iter()
        .map(|k| k.vacancy_id)
        .collect();
    ids.sort();
    ids
}
