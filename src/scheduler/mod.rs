//! Cycle scheduling
//!
//! A single [`CycleTrigger`] drives the scrape cycle on a fixed interval and
//! stops cleanly on request.
//!
//! # Example
//!
//! ```rust,ignore
//! use roomwatch::scheduler::{CycleTrigger, TriggerConfig};
//!
//! let trigger = CycleTrigger::new(TriggerConfig::from(&config.schedule), cycle)?;
//! trigger.start().await?;
//! ```

pub mod error;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use trigger::{CycleTrigger, TriggerConfig, TriggerEvent};
