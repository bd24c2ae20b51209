//! Vacancy deduplication and reconciliation
//!
//! The tracker decides which observed vacancies still need an alert and,
//! once per cycle, forgets tracked vacancies that are no longer listed so a
//! room that reappears later is announced again.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{VacancyKey, VacancyRecord};
use crate::storage::repository::SharedVacancyStore;

// ============================================================================
// Policy
// ============================================================================

/// How targets that failed to fetch affect reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Keep tracked vacancies whose page could not be fetched this cycle
    #[default]
    ExemptFailedTargets,

    /// Reconcile against everything observed, failures included
    Aggregate,
}

impl ReconcilePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExemptFailedTargets => "exempt_failed_targets",
            Self::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for ReconcilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconcilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "exempt_failed_targets" | "exempt" => Ok(Self::ExemptFailedTargets),
            "aggregate" => Ok(Self::Aggregate),
            other => Err(format!(
                "unknown reconcile policy '{other}' (expected exempt_failed_targets or aggregate)"
            )),
        }
    }
}

// ============================================================================
// Cycle observation
// ============================================================================

/// Everything one cycle saw, fed to [`VacancyTracker::reconcile`]
#[derive(Debug, Clone, Default)]
pub struct CycleObservation {
    /// Keys of every record extracted this cycle
    pub observed: HashSet<VacancyKey>,

    /// Target URLs that could not be fetched
    pub failed_targets: HashSet<String>,
}

impl CycleObservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, key: VacancyKey) {
        self.observed.insert(key);
    }

    pub fn target_failed(&mut self, url: impl Into<String>) {
        self.failed_targets.insert(url.into());
    }
}

/// What reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Deleted from the store
    pub forgotten: Vec<VacancyKey>,

    /// Not observed, but kept because their page failed to fetch
    pub exempted: Vec<VacancyKey>,

    /// Tracked vacancies after reconciliation
    pub active_count: usize,
}

// ============================================================================
// Tracker
// ============================================================================

/// Notify-once bookkeeping on top of a [`VacancyStore`](super::VacancyStore)
pub struct VacancyTracker {
    store: SharedVacancyStore,
    policy: ReconcilePolicy,
}

impl VacancyTracker {
    pub fn new(store: SharedVacancyStore, policy: ReconcilePolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &SharedVacancyStore {
        &self.store
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// True iff no alert has been recorded for this vacancy
    pub fn should_notify(&self, key: &VacancyKey) -> Result<bool> {
        Ok(!self.store.exists(key)?)
    }

    /// Record that an alert went out for `record`
    pub fn mark_notified(&self, record: &VacancyRecord) -> Result<()> {
        self.store.insert(record)
    }

    /// Refresh a known vacancy that was observed again
    pub fn seen_again(&self, key: &VacancyKey) -> Result<bool> {
        self.store.touch(key)
    }

    /// Forget tracked vacancies absent from this cycle's observation
    ///
    /// Stops at the first store failure; deletions made before it stay.
    pub fn reconcile(&self, observation: &CycleObservation) -> Result<ReconcileOutcome> {
        let mut stale: Vec<VacancyKey> = self
            .store
            .all_ids()?
            .into_iter()
            .filter(|key| !observation.observed.contains(key))
            .collect();
        stale.sort();

        let mut outcome = ReconcileOutcome::default();

        if self.policy == ReconcilePolicy::ExemptFailedTargets
            && !observation.failed_targets.is_empty()
            && !stale.is_empty()
        {
            let unreachable: HashSet<VacancyKey> = self
                .store
                .list()?
                .into_iter()
                .filter(|entry| observation.failed_targets.contains(&entry.url))
                .map(|entry| entry.key())
                .collect();

            stale.retain(|key| {
                if unreachable.contains(key) {
                    outcome.exempted.push(key.clone());
                    false
                } else {
                    true
                }
            });

            if !outcome.exempted.is_empty() {
                tracing::info!(
                    exempted = outcome.exempted.len(),
                    failed_targets = observation.failed_targets.len(),
                    "Keeping vacancies from targets that failed to fetch"
                );
            }
        }

        for key in stale {
            if self.store.delete_by_id(&key)? {
                tracing::info!(vacancy = %key, "Vacancy no longer listed, forgetting");
                outcome.forgotten.push(key);
            }
        }

        outcome.active_count = self.store.count()?;

        tracing::debug!(
            policy = %self.policy,
            forgotten = outcome.forgotten.len(),
            active = outcome.active_count,
            "Reconciliation complete"
        );

        Ok(outcome)
    }
}
