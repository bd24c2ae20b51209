//! roomwatch - share-house vacancy watcher
//!
//! Periodically fetches share-house listing pages, extracts vacancies of the
//! wanted room type, sends one alert per newly listed vacancy and forgets
//! vacancies once they disappear so a relisting is announced again.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Page fetching and the scrape cycle
//! - [`parser`] - HTML parsing and vacancy extraction
//! - [`models`] - Core data structures and types
//! - [`storage`] - Notified-vacancy store and reconciliation
//! - [`notifications`] - Alert rendering and delivery channels
//! - [`scheduler`] - Interval trigger for cycles
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use roomwatch::config::Config;
//! use roomwatch::crawler::ScrapeCycle;
//! use roomwatch::storage::create_sqlite_store;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     let store = create_sqlite_store(&config.storage.sqlite_path)?;
//!     let cycle = ScrapeCycle::from_config(&config, store)?;
//!     let summary = cycle.run_cycle().await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod scheduler;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{HttpFetcher, PageFetcher, ScrapeCycle};
    pub use crate::error::{Error, ErrorCategory, Result, RoomwatchErrorTrait};
    pub use crate::models::{CycleSummary, NotifiedVacancy, VacancyKey, VacancyRecord};
    pub use crate::notifications::NotificationManager;
    pub use crate::parser::VacancyExtractor;
    pub use crate::storage::{ReconcilePolicy, VacancyStore, VacancyTracker};
}

// Direct re-exports for convenience
pub use models::{CycleSummary, VacancyKey, VacancyRecord};
