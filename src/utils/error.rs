//! Error types for the roomwatch pipeline
//!
//! This module defines the error types raised by the fetch, extraction and
//! cycle stages.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("Maximum retry attempts exceeded")]
    MaxRetriesExceeded,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::MaxRetriesExceeded => true,
            Self::ServerError(status) => *status == 429 || *status >= 500,
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors that can occur while building or running the extractor
#[derive(Error, Debug)]
pub enum ParseError {
    /// A configured CSS selector could not be parsed
    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A configured match value was empty
    #[error("Empty match value for '{0}'")]
    EmptyMatchValue(&'static str),
}

impl ParseError {
    /// Selector and match-value errors are never recoverable
    pub fn is_recoverable(&self) -> bool {
        false
    }
}

/// Errors that abort a scrape cycle
#[derive(Error, Debug)]
pub enum CycleError {
    /// Another cycle holds the run guard
    #[error("A scrape cycle is already in progress")]
    AlreadyRunning,

    /// The vacancy store failed; the cycle was abandoned before reconciliation
    #[error("Vacancy store failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl CycleError {
    /// Both variants clear up by the next scheduled trigger
    pub fn is_recoverable(&self) -> bool {
        true
    }
}
