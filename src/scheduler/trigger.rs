//! Interval trigger for scrape cycles
//!
//! Fires [`ScrapeCycle::run_cycle`] on a fixed cadence. Missed ticks are
//! delayed rather than bursted, so a slow cycle never causes a pile-up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use super::error::{SchedulerError, SchedulerResult};
use crate::config::ScheduleConfig;
use crate::crawler::ScrapeCycle;
use crate::models::CycleSummary;
use crate::utils::error::CycleError;

/// Interval at which the stop flag is polled
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Configuration for the cycle trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Time between cycle starts
    pub interval: Duration,

    /// Fire the first cycle immediately instead of after one interval
    pub run_on_startup: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for TriggerConfig {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            interval: config.interval(),
            run_on_startup: config.run_on_startup,
        }
    }
}

impl TriggerConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            run_on_startup: true,
        }
    }

    pub fn run_on_startup(mut self, value: bool) -> Self {
        self.run_on_startup = value;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.interval.is_zero() {
            return Err(SchedulerError::invalid_interval(self.interval.as_secs()));
        }
        Ok(())
    }
}

// ============================================================================
// Trigger Events
// ============================================================================

/// Events broadcast by the trigger
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    /// A cycle ran to completion
    CycleCompleted { summary: CycleSummary },

    /// The tick found a cycle still in progress
    CycleSkipped { at: DateTime<Utc> },

    /// A cycle was aborted
    CycleFailed { reason: String, at: DateTime<Utc> },
}

// ============================================================================
// Cycle Trigger
// ============================================================================

/// Runs scrape cycles on an interval until stopped
pub struct CycleTrigger {
    config: TriggerConfig,
    cycle: Arc<ScrapeCycle>,
    event_sender: broadcast::Sender<TriggerEvent>,
    is_running: Arc<RwLock<bool>>,
}

impl CycleTrigger {
    /// Create a new cycle trigger
    pub fn new(config: TriggerConfig, cycle: Arc<ScrapeCycle>) -> SchedulerResult<Self> {
        config.validate()?;

        let (event_sender, _) = broadcast::channel(100);

        Ok(Self {
            config,
            cycle,
            event_sender,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Subscribe to trigger events
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.event_sender.subscribe()
    }

    /// Start the trigger loop (runs until stopped)
    pub async fn start(&self) -> SchedulerResult<()> {
        {
            let mut running = self.is_running.write().await;
            if *running {
                return Err(SchedulerError::AlreadyStarted);
            }
            *running = true;
        }

        let first_tick = if self.config.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + self.config.interval
        };
        let mut ticker = tokio::time::interval_at(first_tick, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            run_on_startup = self.config.run_on_startup,
            targets = self.cycle.targets().len(),
            "Cycle trigger started"
        );

        while *self.is_running.read().await {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trigger_now().await;
                }
                _ = self.wait_for_stop() => {
                    break;
                }
            }
        }

        tracing::info!("Cycle trigger stopped");
        Ok(())
    }

    /// Stop the trigger loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    /// Check if trigger is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Run one cycle now and report the outcome
    ///
    /// Cycle errors are logged and broadcast; they never stop the loop.
    pub async fn trigger_now(&self) -> TriggerEvent {
        let event = match self.cycle.run_cycle().await {
            Ok(summary) => TriggerEvent::CycleCompleted { summary },
            Err(CycleError::AlreadyRunning) => {
                tracing::warn!("Previous cycle still running, skipping this tick");
                TriggerEvent::CycleSkipped { at: Utc::now() }
            }
            Err(e) => {
                let err = SchedulerError::execution_failed(e.to_string());
                tracing::error!(error = %err, "Scheduled cycle failed");
                TriggerEvent::CycleFailed {
                    reason: e.to_string(),
                    at: Utc::now(),
                }
            }
        };

        let _ = self.event_sender.send(event.clone());
        event
    }

    // Internal: Wait for stop signal
    async fn wait_for_stop(&self) {
        loop {
            if !*self.is_running.read().await {
                break;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }
}
