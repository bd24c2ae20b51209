//! Vacancy persistence
//!
//! SQLite keeps the set of already-notified vacancies across restarts; the
//! dedup layer on top of it decides what to announce and what to forget.

pub mod dedup;
pub mod repository;

pub use dedup::{CycleObservation, ReconcileOutcome, ReconcilePolicy, VacancyTracker};
pub use repository::{
    create_memory_store, create_sqlite_store, MemoryVacancyStore, SharedVacancyStore,
    SqliteVacancyStore, VacancyStore,
};
