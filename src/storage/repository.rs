//! Repository Pattern for the notified-vacancy store
//!
//! The tracker only talks to the [`VacancyStore`] trait, so the durable
//! SQLite implementation and the in-memory one are interchangeable.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                VacancyTracker / ScrapeCycle                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     VacancyStore trait                      │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                             │
//!                   ▼                             ▼
//!         ┌─────────────────┐           ┌─────────────────┐
//!         │     SQLite      │           │    In-memory    │
//!         │  Implementation │           │ Implementation  │
//!         └─────────────────┘           └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use roomwatch::storage::{SqliteVacancyStore, VacancyStore};
//!
//! let store = SqliteVacancyStore::new("data/roomwatch.db")?;
//! if !store.exists(&record.key())? {
//!     store.insert(&record)?;
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{NotifiedVacancy, VacancyKey, VacancyRecord};

/// Storage format for timestamps
const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ============================================================================
// Repository Trait
// ============================================================================

/// Durable mapping from vacancy identity to "already notified" metadata
///
/// Cycles run one at a time, so implementations only need to be safe for a
/// single writer.
pub trait VacancyStore: Send + Sync {
    /// Check whether a notification is on record for this vacancy
    fn exists(&self, key: &VacancyKey) -> Result<bool>;

    /// Record a notified vacancy
    ///
    /// A fresh entry starts with `notification_count = 1` and both timestamps
    /// set to now. Inserting an already-tracked key counts a repeat
    /// notification instead of failing.
    fn insert(&self, record: &VacancyRecord) -> Result<()>;

    /// Remove a vacancy; returns whether a row was actually removed
    fn delete_by_id(&self, key: &VacancyKey) -> Result<bool>;

    /// Every tracked identity
    fn all_ids(&self) -> Result<HashSet<VacancyKey>>;

    /// Number of tracked vacancies
    fn count(&self) -> Result<usize>;

    /// Get a tracked vacancy
    fn get(&self, key: &VacancyKey) -> Result<Option<NotifiedVacancy>>;

    /// All tracked vacancies, most recently seen first
    fn list(&self) -> Result<Vec<NotifiedVacancy>>;

    /// Refresh `last_seen_at`; returns whether the vacancy is tracked
    fn touch(&self, key: &VacancyKey) -> Result<bool>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of VacancyStore
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteVacancyStore {
    conn: Mutex<Connection>,
}

impl SqliteVacancyStore {
    /// Open (or create) the store at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite vacancy store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS notified_vacancies (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    vacancy_id TEXT NOT NULL,
                    share_house_name TEXT NOT NULL,
                    url TEXT NOT NULL,
                    room_type TEXT NOT NULL,
                    first_notified_at TEXT NOT NULL,
                    last_seen_at TEXT NOT NULL,
                    notification_count INTEGER NOT NULL DEFAULT 1
                        CHECK (notification_count >= 1),
                    UNIQUE (vacancy_id, share_house_name)
                );

                CREATE INDEX IF NOT EXISTS idx_notified_vacancies_last_seen
                    ON notified_vacancies(last_seen_at);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    fn row_to_vacancy(row: &Row<'_>) -> rusqlite::Result<NotifiedVacancy> {
        Ok(NotifiedVacancy {
            vacancy_id: row.get(0)?,
            share_house_name: row.get(1)?,
            url: row.get(2)?,
            room_type: row.get(3)?,
            first_notified_at: parse_timestamp(row, 4)?,
            last_seen_at: parse_timestamp(row, 5)?,
            notification_count: row.get(6)?,
        })
    }
}

fn now_timestamp() -> String {
    Local::now()
        .naive_local()
        .format(DB_TIMESTAMP_FORMAT)
        .to_string()
}

/// Read a stored timestamp column; unreadable values are conversion errors
fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DB_TIMESTAMP_FORMAT).map_err(|e| {
        tracing::warn!(value = %raw, column = idx, error = %e, "Unreadable timestamp in vacancy store");
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

impl VacancyStore for SqliteVacancyStore {
    fn exists(&self, key: &VacancyKey) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM notified_vacancies
                 WHERE vacancy_id = ?1 AND share_house_name = ?2)",
                params![key.vacancy_id, key.share_house_name],
                |row| row.get(0),
            )
            .context("Failed to check vacancy")?;

        Ok(exists)
    }

    fn insert(&self, record: &VacancyRecord) -> Result<()> {
        let conn = self.conn()?;
        let now = now_timestamp();

        conn.execute(
            r#"
                INSERT INTO notified_vacancies
                    (vacancy_id, share_house_name, url, room_type,
                     first_notified_at, last_seen_at, notification_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5, 1)
                ON CONFLICT(vacancy_id, share_house_name) DO UPDATE SET
                    url = excluded.url,
                    room_type = excluded.room_type,
                    last_seen_at = excluded.last_seen_at,
                    notification_count = notification_count + 1
                "#,
            params![
                record.vacancy_id,
                record.share_house_name,
                record.url,
                record.room_type,
                now
            ],
        )
        .context("Failed to insert notified vacancy")?;

        tracing::info!(vacancy = %record.key(), "Saved notified vacancy");
        Ok(())
    }

    fn delete_by_id(&self, key: &VacancyKey) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM notified_vacancies WHERE vacancy_id = ?1 AND share_house_name = ?2",
                params![key.vacancy_id, key.share_house_name],
            )
            .context("Failed to delete notified vacancy")?;

        if deleted > 0 {
            tracing::info!(vacancy = %key, "Deleted notified vacancy");
        }
        Ok(deleted > 0)
    }

    fn all_ids(&self) -> Result<HashSet<VacancyKey>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT vacancy_id, share_house_name FROM notified_vacancies")
            .context("Failed to prepare id query")?;

        let ids = stmt
            .query_map([], |row| Ok(VacancyKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<HashSet<_>>>()
            .context("Failed to read vacancy ids")?;

        Ok(ids)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM notified_vacancies", [], |row| row.get(0))
            .context("Failed to count vacancies")?;
        Ok(count as usize)
    }

    fn get(&self, key: &VacancyKey) -> Result<Option<NotifiedVacancy>> {
        let conn = self.conn()?;
        let vacancy = conn
            .query_row(
                "SELECT vacancy_id, share_house_name, url, room_type,
                        first_notified_at, last_seen_at, notification_count
                 FROM notified_vacancies
                 WHERE vacancy_id = ?1 AND share_house_name = ?2",
                params![key.vacancy_id, key.share_house_name],
                Self::row_to_vacancy,
            )
            .optional()
            .context("Failed to get notified vacancy")?;

        Ok(vacancy)
    }

    fn list(&self) -> Result<Vec<NotifiedVacancy>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT vacancy_id, share_house_name, url, room_type,
                        first_notified_at, last_seen_at, notification_count
                 FROM notified_vacancies
                 ORDER BY last_seen_at DESC, vacancy_id ASC",
            )
            .context("Failed to prepare list query")?;

        let vacancies = stmt
            .query_map([], Self::row_to_vacancy)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list notified vacancies")?;

        Ok(vacancies)
    }

    fn touch(&self, key: &VacancyKey) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE notified_vacancies SET last_seen_at = ?3
                 WHERE vacancy_id = ?1 AND share_house_name = ?2",
                params![key.vacancy_id, key.share_house_name, now_timestamp()],
            )
            .context("Failed to update last seen time")?;

        Ok(updated > 0)
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

/// In-memory implementation of VacancyStore
///
/// Useful for testing and dry runs; state is lost when the process exits.
pub struct MemoryVacancyStore {
    records: RwLock<HashMap<VacancyKey, NotifiedVacancy>>,
}

impl MemoryVacancyStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.read().map(|r| r.is_empty()).unwrap_or(true)
    }

    /// Clear all records
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<VacancyKey, NotifiedVacancy>>> {
        self.records
            .read()
            .map_err(|_| anyhow!("vacancy store lock poisoned"))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<VacancyKey, NotifiedVacancy>>> {
        self.records
            .write()
            .map_err(|_| anyhow!("vacancy store lock poisoned"))
    }
}

impl Default for MemoryVacancyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VacancyStore for MemoryVacancyStore {
    fn exists(&self, key: &VacancyKey) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn insert(&self, record: &VacancyRecord) -> Result<()> {
        let mut records = self.write()?;
        records
            .entry(record.key())
            .and_modify(|existing| {
                existing.url = record.url.clone();
                existing.room_type = record.room_type.clone();
                existing.last_seen_at = Local::now().naive_local();
                existing.notification_count += 1;
            })
            .or_insert_with(|| NotifiedVacancy::from_record(record));
        Ok(())
    }

    fn delete_by_id(&self, key: &VacancyKey) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn all_ids(&self) -> Result<HashSet<VacancyKey>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    fn get(&self, key: &VacancyKey) -> Result<Option<NotifiedVacancy>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<NotifiedVacancy>> {
        let mut vacancies: Vec<_> = self.read()?.values().cloned().collect();
        vacancies.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.vacancy_id.cmp(&b.vacancy_id))
        });
        Ok(vacancies)
    }

    fn touch(&self, key: &VacancyKey) -> Result<bool> {
        Ok(match self.write()?.get_mut(key) {
            Some(existing) => {
                existing.last_seen_at = Local::now().naive_local();
                true
            }
            None => false,
        })
    }
}

// ============================================================================
// Shared Store Types
// ============================================================================

/// Thread-safe shared store wrapper
pub type SharedVacancyStore = Arc<dyn VacancyStore>;

/// Create a shared SQLite store
pub fn create_sqlite_store(path: impl AsRef<Path>) -> Result<SharedVacancyStore> {
    let store = SqliteVacancyStore::new(path)?;
    Ok(Arc::new(store))
}

/// Create a shared in-memory store
pub fn create_memory_store() -> SharedVacancyStore {
    Arc::new(MemoryVacancyStore::new())
}

// ============================================================================
// Tests
// ============================================================================
