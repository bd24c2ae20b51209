//! One scrape cycle over every configured target
//!
//! # Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Targets   │     │   Fetcher   │     │  Extractor  │     │   Tracker   │
//! │ (in order)  │────▶│ (bounded    │────▶│  (records)  │────▶│ notify-once │
//! └─────────────┘     │ concurrency)│     └─────────────┘     └─────────────┘
//!                     └─────────────┘                                │
//!                                                                    ▼
//!                                                             ┌─────────────┐
//!                                                             │  Reconcile  │
//!                                                             └─────────────┘
//! ```
//!
//! Fetches may overlap; everything after the fetch runs sequentially on the
//! calling task, in configured target order.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::PageFetcher;
use crate::error::Error;
use crate::models::{CycleSummary, TargetReport, TargetState, VacancyRecord};
use crate::notifications::NotificationManager;
use crate::parser::VacancyExtractor;
use crate::storage::dedup::{CycleObservation, VacancyTracker};
use crate::storage::repository::SharedVacancyStore;
use crate::utils::error::{CycleError, FetchError};

/// Default number of targets fetched at once
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Orchestrates fetch, extraction, notification and reconciliation
pub struct ScrapeCycle {
    fetcher: Arc<dyn PageFetcher>,
    extractor: VacancyExtractor,
    tracker: VacancyTracker,
    notifier: NotificationManager,
    targets: Vec<String>,
    max_concurrent_fetches: usize,

    /// Held for the duration of a cycle
    running: Mutex<()>,
}

impl ScrapeCycle {
    /// Assemble a cycle from its collaborators
    ///
    /// Targets are trimmed and blank entries dropped; order is kept.
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: VacancyExtractor,
        tracker: VacancyTracker,
        notifier: NotificationManager,
        targets: &[String],
    ) -> Self {
        let targets = targets
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            fetcher,
            extractor,
            tracker,
            notifier,
            targets,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            running: Mutex::new(()),
        }
    }

    /// Wire the production collaborators from configuration
    ///
    /// # Errors
    ///
    /// `Error::Fetch` if the HTTP client cannot be built, `Error::Parse` for
    /// invalid extraction rules and `Error::Channel` for an unusable relay
    pub fn from_config(config: &Config, store: SharedVacancyStore) -> Result<Self, Error> {
        let fetcher = HttpFetcher::from_config(&config.crawler)?;
        let extractor = VacancyExtractor::from_config(&config.extractor)?;
        let notifier = NotificationManager::from_config(&config.notify)?;
        let tracker = VacancyTracker::new(store, config.storage.reconcile_policy);

        Ok(Self::new(
            Arc::new(fetcher),
            extractor,
            tracker,
            notifier,
            &config.targets.urls,
        )
        .with_max_concurrent_fetches(config.crawler.max_concurrent_fetches))
    }

    /// Set how many targets may be fetched at once
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn tracker(&self) -> &VacancyTracker {
        &self.tracker
    }

    /// Whether a cycle currently holds the run guard
    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }

    /// Run one full cycle
    ///
    /// # Errors
    ///
    /// - `CycleError::AlreadyRunning` if another cycle is in progress
    /// - `CycleError::Storage` if the vacancy store fails; reconciliation is
    ///   skipped so nothing tracked is forgotten
    pub async fn run_cycle(&self) -> Result<CycleSummary, CycleError> {
        let _guard = self.running.try_lock().map_err(|_| {
            tracing::warn!("Scrape cycle requested while another is running");
            CycleError::AlreadyRunning
        })?;

        let cycle_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        tracing::info!(
            cycle_id = %cycle_id,
            targets = self.targets.len(),
            "Starting scrape cycle"
        );

        let mut observation = CycleObservation::new();
        let mut reports = Vec::with_capacity(self.targets.len());

        let result = self
            .process_targets(&mut observation, &mut reports)
            .await
            .and_then(|()| {
                self.tracker
                    .reconcile(&observation)
                    .map_err(CycleError::Storage)
            });

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    cycle_id = %cycle_id,
                    error = %e,
                    "Scrape cycle aborted"
                );
                return Err(e);
            }
        };

        let summary = CycleSummary {
            cycle_id,
            targets_processed: reports.len(),
            targets_failed: reports.iter().filter(|r| r.failed).count(),
            records_observed: reports.iter().map(|r| r.records).sum(),
            new_notifications: reports.iter().map(|r| r.notified).sum(),
            forgotten: outcome.forgotten.len(),
            active_count: outcome.active_count,
            started_at,
            finished_at: Utc::now(),
            targets: reports,
        };

        tracing::info!(
            cycle_id = %summary.cycle_id,
            targets = summary.targets_processed,
            failed = summary.targets_failed,
            observed = summary.records_observed,
            notified = summary.new_notifications,
            forgotten = summary.forgotten,
            active = summary.active_count,
            duration_ms = summary.duration().num_milliseconds(),
            "Scrape cycle complete"
        );

        Ok(summary)
    }

    async fn process_targets(
        &self,
        observation: &mut CycleObservation,
        reports: &mut Vec<TargetReport>,
    ) -> Result<(), CycleError> {
        let mut fetches = stream::iter(self.targets.clone())
            .map(|url| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let fetched = fetcher.fetch(&url).await;
                    (url, fetched)
                }
            })
            .buffered(self.max_concurrent_fetches);

        while let Some((url, fetched)) = fetches.next().await {
            let mut report = TargetReport::new(url.as_str());

            match fetched {
                Ok(html) => {
                    report.advance(TargetState::Fetched);
                    let records = self.extractor.extract(&html, &url);
                    report.advance(TargetState::Extracted);
                    report.records = records.len();

                    for record in &records {
                        self.process_record(record, &mut report).await?;
                        observation.observe(record.key());
                    }
                }
                Err(e) => self.record_failure(&url, e, &mut report, observation),
            }

            report.advance(TargetState::Done);
            reports.push(report);
        }

        Ok(())
    }

    async fn process_record(
        &self,
        record: &VacancyRecord,
        report: &mut TargetReport,
    ) -> Result<(), CycleError> {
        let key = record.key();

        if self.tracker.should_notify(&key).map_err(CycleError::Storage)? {
            self.notifier.notify(record).await;
            self.tracker
                .mark_notified(record)
                .map_err(CycleError::Storage)?;
            report.notified += 1;
        } else {
            tracing::debug!(vacancy = %key, "Vacancy already notified");
            self.tracker.seen_again(&key).map_err(CycleError::Storage)?;
            report.skipped += 1;
        }

        Ok(())
    }

    fn record_failure(
        &self,
        url: &str,
        error: FetchError,
        report: &mut TargetReport,
        observation: &mut CycleObservation,
    ) {
        tracing::warn!(url, error = %error, "Failed to fetch target, skipping");
        report.advance(TargetState::Failed);
        report.error = Some(error.to_string());
        observation.target_failed(url);
    }
}
