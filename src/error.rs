//! Unified error handling for the roomwatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`RoomwatchErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use roomwatch::error::{Error, RoomwatchErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         eprintln!("Will retry next cycle: {}", err.user_desc());
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::fmt;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::notifications::ChannelError;
pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{CycleError, FetchError, ParseError};

/// Common trait for all roomwatch error types
pub trait RoomwatchErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Short description for user-facing messages
    fn user_desc(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage errors
    Storage,
    /// Alert delivery errors
    Notification,
    /// Configuration and validation errors
    Config,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Notification => "notification",
            Self::Config => "config",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the roomwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Scrape cycle errors
    #[error("Cycle error: {0}")]
    Cycle(#[from] CycleError),

    /// Alert delivery errors
    #[error("Notification error: {0}")]
    Channel(#[from] ChannelError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Anything else surfaced through `anyhow`
    #[error("{0}")]
    Other(String),
}

impl RoomwatchErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Cycle(e) => e.is_recoverable(),
            Self::Channel(_) => true,
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Config(_) => false,
            Self::Other(_) => false,
        }
    }

    fn user_desc(&self) -> String {
        match self {
            Self::Fetch(e) => format!("Could not fetch listing page: {e}"),
            Self::Parse(e) => format!("Invalid extraction rules: {e}"),
            Self::Cycle(CycleError::AlreadyRunning) => {
                "A check is already in progress".to_string()
            }
            Self::Cycle(e) => format!("Vacancy check aborted: {e}"),
            Self::Channel(e) => format!("Could not deliver alert: {e}"),
            Self::Scheduler(e) => format!("Scheduler problem: {e}"),
            Self::Database(e) => format!("Vacancy database problem: {e}"),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            Self::Other(context) => context.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Parse(_) => ErrorCategory::Parsing,
            Self::Cycle(CycleError::AlreadyRunning) => ErrorCategory::Scheduler,
            Self::Cycle(CycleError::Storage(_)) => ErrorCategory::Storage,
            Self::Channel(_) => ErrorCategory::Notification,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Database(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other(_) => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<rusqlite::Error>() {
            Ok(db) => Self::Database(db),
            Err(err) => Self::Other(format!("{err:#}")),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
