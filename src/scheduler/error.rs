//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Interval between cycles must be positive
    InvalidInterval { secs: u64 },

    /// Trigger loop started twice
    AlreadyStarted,

    /// A cycle fired by the trigger failed
    TriggerExecutionFailed { reason: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInterval { secs } => {
                write!(f, "Invalid cycle interval '{secs}s'. Must be greater than 0")
            }
            Self::AlreadyStarted => write!(f, "Trigger loop is already running"),
            Self::TriggerExecutionFailed { reason } => {
                write!(f, "Trigger execution failed: {reason}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid interval error
    pub fn invalid_interval(secs: u64) -> Self {
        Self::InvalidInterval { secs }
    }

    /// Create an execution error
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::TriggerExecutionFailed {
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TriggerExecutionFailed { .. })
    }
}
