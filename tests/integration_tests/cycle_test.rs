//! End-to-end scrape cycle tests
//!
//! Fetch → extract → notify-once → reconcile against stub pages.

use std::sync::Arc;

use roomwatch::models::{TargetState, VacancyKey};
use roomwatch::storage::{
    MemoryVacancyStore, ReconcilePolicy, SqliteVacancyStore, VacancyStore,
};

use super::fixtures::*;

#[tokio::test]
async fn test_new_vacancy_is_notified_once() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("Oak House Shibuya", &[vacancy("v1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher.clone(),
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );

    // Cycle 1: first sighting
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 1);
    assert_eq!(summary.records_observed, 1);
    assert_eq!(summary.active_count, 1);
    assert_eq!(channel.vacancy_ids(), vec!["v1"]);
    assert_eq!(tracked_ids(&*store), vec!["v1"]);

    let alert = channel.alerts.lock().unwrap()[0].clone();
    assert_eq!(
        alert.subject,
        "Vacancy Alert: Oak House Shibuya - Apartment Available!"
    );
    assert_eq!(alert.recipient.as_deref(), Some("tenant@example.com"));
    assert_eq!(alert.vacancy.url, PAGE_A);

    // Cycle 2: unchanged page
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 0);
    assert_eq!(summary.targets[0].skipped, 1);
    assert_eq!(channel.count(), 1);
    assert_eq!(tracked_ids(&*store), vec!["v1"]);
}

#[tokio::test]
async fn test_disappeared_vacancy_is_renotified_on_return() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("Oak House", &[vacancy("v1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher.clone(),
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );

    cycle.run_cycle().await.unwrap();
    cycle.run_cycle().await.unwrap();
    assert_eq!(channel.count(), 1);

    // Cycle 3: v1 taken off the page
    fetcher.set_page(PAGE_A, listing("Oak House", &[occupied("v1")]));
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.forgotten, 1);
    assert_eq!(summary.active_count, 0);
    assert!(tracked_ids(&*store).is_empty());

    // Cycle 4: v1 listed again
    fetcher.set_page(PAGE_A, listing("Oak House", &[vacancy("v1", "Apartment")]));
    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.new_notifications, 1);
    assert_eq!(channel.vacancy_ids(), vec!["v1", "v1"]);
    assert_eq!(tracked_ids(&*store), vec!["v1"]);
}

#[tokio::test]
async fn test_other_room_type_is_ignored() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("Oak House", &[vacancy("v1", "Studio")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher,
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );

    let summary = cycle.run_cycle().await.unwrap();
    assert_eq!(summary.records_observed, 0);
    assert_eq!(summary.new_notifications, 0);
    assert_eq!(channel.count(), 0);
    assert_eq!(store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_reconcile_keeps_observed_and_new() {
    let fetcher = StubFetcher::new();
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher.clone(),
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );

    fetcher.set_page(
        PAGE_A,
        listing(
            "Oak House",
            &[
                vacancy("A", "Apartment"),
                vacancy("B", "Apartment"),
                vacancy("C", "Apartment"),
            ],
        ),
    );
    cycle.run_cycle().await.unwrap();
    assert_eq!(tracked_ids(&*store), vec!["A", "B", "C"]);

    fetcher.set_page(
        PAGE_A,
        listing(
            "Oak House",
            &[
                vacancy("B", "Apartment"),
                vacancy("C", "Apartment"),
                vacancy("D", "Apartment"),
            ],
        ),
    );
    let summary = cycle.run_cycle().await.unwrap();

    assert_eq!(summary.new_notifications, 1);
    assert_eq!(summary.forgotten, 1);
    assert_eq!(tracked_ids(&*store), vec!["B", "C", "D"]);
    assert_eq!(channel.vacancy_ids(), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_same_id_at_two_houses_is_distinct() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("Oak House Shibuya", &[vacancy("room-1", "Apartment")]));
    fetcher.set_page(PAGE_B, listing("Oak House Nakano", &[vacancy("room-1", "Apartment")]));
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

    assert_eq!(summary.new_notifications, 2);
    assert_eq!(store.count().unwrap(), 2);
    assert!(store
        .exists(&VacancyKey::new("room-1", "Oak House Shibuya"))
        .unwrap());
    assert!(store
        .exists(&VacancyKey::new("room-1", "Oak House Nakano"))
        .unwrap());
}

#[tokio::test]
async fn test_reports_follow_configured_order() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("A", &[vacancy("a1", "Apartment")]));
    fetcher.set_page(PAGE_B, listing("B", &[vacancy("b1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher,
        store,
        &channel,
        &[PAGE_B, "   ", PAGE_A],
        ReconcilePolicy::default(),
    )
    .with_max_concurrent_fetches(2);

    let summary = cycle.run_cycle().await.unwrap();

    let urls: Vec<_> = summary.targets.iter().map(|t| t.url.as_str()).collect();
    assert_eq!(urls, vec![PAGE_B, PAGE_A]);
    assert!(summary
        .targets
        .iter()
        .all(|t| t.state == TargetState::Done && !t.failed));
    assert_eq!(channel.vacancy_ids(), vec!["b1", "a1"]);
}

#[tokio::test]
async fn test_known_vacancy_refreshes_last_seen() {
    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("Oak House", &[vacancy("v1", "Apartment")]));
    let store = Arc::new(MemoryVacancyStore::new());
    let channel = RecordingChannel::new();
    let cycle = build_cycle(
        fetcher,
        store.clone(),
        &channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );

    cycle.run_cycle().await.unwrap();
    let key = VacancyKey::new("v1", "Oak House");
    let first = store.get(&key).unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    cycle.run_cycle().await.unwrap();
    let second = store.get(&key).unwrap().unwrap();

    assert!(second.last_seen_at > first.last_seen_at);
    assert_eq!(second.first_notified_at, first.first_notified_at);
    assert_eq!(second.notification_count, 1);
}

#[tokio::test]
async fn test_state_survives_restart_with_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("roomwatch.db");

    let fetcher = StubFetcher::new();
    fetcher.set_page(PAGE_A, listing("Oak House", &[vacancy("v1", "Apartment")]));

    let first_channel = RecordingChannel::new();
    {
        let store = Arc::new(SqliteVacancyStore::new(&db_path).unwrap());
        let cycle = build_cycle(
            fetcher.clone(),
            store,
            &first_channel,
            &[PAGE_A],
            ReconcilePolicy::default(),
        );
        cycle.run_cycle().await.unwrap();
    }
    assert_eq!(first_channel.count(), 1);

    // New process, same database: nothing to announce
    let second_channel = RecordingChannel::new();
    let store = Arc::new(SqliteVacancyStore::new(&db_path).unwrap());
    let cycle = build_cycle(
        fetcher,
        store.clone(),
        &second_channel,
        &[PAGE_A],
        ReconcilePolicy::default(),
    );
    let summary = cycle.run_cycle().await.unwrap();

    assert_eq!(summary.new_notifications, 0);
    assert_eq!(second_channel.count(), 0);
    assert_eq!(tracked_ids(&*store), vec!["v1"]);
}
