//! Failure handling across the scrape cycle
//!
//! Fetch failures, alert delivery failures, store failures and overlapping
//! triggers.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use roomwatch::config::Config;
use roomwatch::crawler::ScrapeCycle;
use roomwatch::error::{Error, ErrorCategory, RoomwatchErrorTrait};
use roomwatch::models::TargetState;
use roomwatch::storage::{MemoryVacancyStore, ReconcilePolicy, VacancyStore};
use roomwatch::utils::error::CycleError;

use super::fixtures::*;

async fn seeded_two_targets(
    policy: ReconcilePolicy,
) -> (
    Arc<StubFetcher>,
    Arc<MemoryVacancyStore>,
    RecordingChannel,
    ScrapeCycle,
) {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    fetcher.set_page(PAGE_B, listing("House B", &[vacancy("b1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher.clone(),
        store.clone(),
        &channel,
        &[PAGE_A, PAGE_B],
        policy,
    );

    cycle.run_cycle().await.unwrap();
    assert_eq!(tracked_ids(&*store), vec!["a1", "b1"]);

    (fetcher, store, channel, cycle)
}

#[tokio::test]
async fn test_fetch_failure_does_not_stop_cycle() {
    let fetcher = StubFetcher::new();
    fetcher.fail(PAGE_A);
    fetcher.set_page(PAGE_B, listing("House B", &[vacancy("b1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher,
        store.clone(),
        &channel,
        &[PAGE_A, PAGE_B],
        ReconcilePolicy::default(),
    );

    let summary = cycle.run_cycle().await.unwrap();

    assert_eq!(summary.targets_processed, 2);
    assert_eq!(summary.targets_failed, 1);
    assert_eq!(summary.new_notifications, 1);

    let failed = &summary.targets[0];
    assert!(failed.failed);
    assert_eq!(failed.state, TargetState::Done);
    assert!(failed.error.as_deref().unwrap().contains("503"));
    assert_eq!(tracked_ids(&*store), vec!["b1"]);
}

#[tokio::test]
async fn test_failed_target_exempt_policy_keeps_entries() {
    let (fetcher, store, channel, cycle) =
        seeded_two_targets(ReconcilePolicy::ExemptFailedTargets).await;

    fetcher.fail(PAGE_A);
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.forgotten, 0);
    assert_eq!(tracked_ids(&*store), vec!["a1", "b1"]);

    // Page A back with the same vacancy: no duplicate alert
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 0);
    assert_eq!(channel.count(), 2);
}

#[tokio::test]
async fn test_failed_target_aggregate_policy_forgets_entries() {
    let (fetcher, store, channel, cycle) = seeded_two_targets(ReconcilePolicy::Aggregate).await;

    fetcher.fail(PAGE_A);
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.forgotten, 1);
    assert_eq!(tracked_ids(&*store), vec!["b1"]);

    // Page A recovers: a1 is announced again
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 1);
    assert_eq!(channel.vacancy_ids(), vec!["a1", "b1", "a1"]);
}

#[tokio::test]
async fn test_notifier_failure_still_marks_notified() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    channel.failing.store(true, Ordering::SeqCst);
    let cycle = build_cycle(
        fetcher,
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );

    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 1);
    assert_eq!(channel.count(), 0);
    assert_eq!(tracked_ids(&*store), vec!["a1"]);

    // Delivery recovers, but the vacancy is not announced twice
    channel.failing.store(false, Ordering::SeqCst);
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 0);
    assert_eq!(channel.count(), 0);
}

#[tokio::test]
async fn test_insert_failure_aborts_cycle_without_reconcile() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    let store = FlakyStore::new();
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher.clone(),
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );
    cycle.run_cycle().await.unwrap();

    // a1 disappears and a2 shows up, but the store refuses the insert
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a2", "Apartment")]));
    store.fail_inserts.store(true, Ordering::SeqCst);

    let result = cycle.run_cycle().await;
    assert!(matches!(result, Err(CycleError::Storage(_))));

    // Reconciliation did not run, so a1 is still tracked
    assert_eq!(tracked_ids(&*store), vec!["a1"]);
    assert!(!cycle.is_running());
}

#[tokio::test]
async fn test_delete_failure_is_reported() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    let store = FlakyStore::new();
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher.clone(),
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );
    cycle.run_cycle().await.unwrap();

    fetcher.set_page(PAGE_A, listing("House A", &[]));
    store.fail_deletes.store(true, Ordering::SeqCst);

    assert!(matches!(
        cycle.run_cycle().await,
        Err(CycleError::Storage(_))
    ));
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_overlapping_cycle_is_rejected() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("House A", &[vacancy("a1", "Apartment")]));
    fetcher.set_delay(Duration::from_millis(200));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = Arc::new(build_cycle(
        fetcher.clone(),
        store,
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    ));

    let running = Arc::clone(&cycle);
    let first = tokio::spawn(async move { running.run_cycle().await });

    // Let the first cycle take the guard
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cycle.is_running());

    let second = cycle.run_cycle().await;
    assert!(matches!(second, Err(CycleError::AlreadyRunning)));

    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.new_notifications, 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(channel.count(), 1);
}

#[tokio::test]
async fn test_bad_configuration_reports_typed_errors() {
    let mut config = Config::default();
    config.targets.urls = vec![PAGE_A.to_string()];
    config.extractor.vacancy_selector = "div[".to_string();

    let err = ScrapeCycle::from_config(&config, Arc::new(MemoryVacancyStore::new()))
        .err()
        .unwrap();
    assert!(matches!(err, Error::Parse(_)));
    assert_eq!(err.category(), ErrorCategory::Parsing);
    assert!(!err.is_recoverable());

    let mut config = Config::default();
    config.targets.urls = vec![PAGE_A.to_string()];
    config.notify.webhook_url = Some(String::new());

    let err = ScrapeCycle::from_config(&config, Arc::new(MemoryVacancyStore::new()))
        .err()
        .unwrap();
    assert!(matches!(err, Error::Channel(_)));
    assert_eq!(err.category(), ErrorCategory::Notification);
}
