//! Configuration management for roomwatch
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::storage::dedup::ReconcilePolicy;
use crate::utils::split_targets;

/// Highest accepted `crawler.max_retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pages to poll every cycle
    pub targets: TargetsConfig,

    /// Markup extraction rules
    pub extractor: ExtractorConfig,

    /// Page fetch configuration
    pub crawler: CrawlerConfig,

    /// Vacancy store configuration
    pub storage: StorageConfig,

    /// Notification configuration
    pub notify: NotifyConfig,

    /// Cycle cadence
    pub schedule: ScheduleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Target page list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Listing page URLs
    pub urls: Vec<String>,
}

/// Selectors and match values used by the vacancy extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Element holding the share-house display name
    pub title_selector: String,

    /// Elements flagged as vacant
    pub vacancy_selector: String,

    /// Label/value entries inside a vacancy element
    pub entry_selector: String,

    /// Label part of an entry
    pub label_selector: String,

    /// Value part of an entry
    pub value_selector: String,

    /// Label naming the room type entry (case-insensitive)
    pub room_type_label: String,

    /// Room type that qualifies for notification (case-insensitive)
    pub room_type_value: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            title_selector: String::from("h1.p-description__name"),
            vacancy_selector: String::from("[data-status=vacancy]"),
            entry_selector: String::from("li.u-pc_only.has-label"),
            label_selector: String::from("strong"),
            value_selector: String::from("span"),
            room_type_label: String::from("Room type"),
            room_type_value: String::from("Apartment"),
        }
    }
}

/// Page fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Fixed user agent; a browser-like one is rotated when unset
    pub user_agent: Option<String>,

    /// Rate limit (requests per second)
    pub rate_limit: u32,

    /// Retries for 429/5xx and transport errors
    pub max_retries: u32,

    /// Maximum number of targets fetched at once
    pub max_concurrent_fetches: usize,
}

impl CrawlerConfig {
    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            user_agent: None,
            rate_limit: 2,
            max_retries: 2,
            max_concurrent_fetches: 4,
        }
    }
}

/// Vacancy store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// How targets that failed to fetch are treated during reconciliation
    pub reconcile_policy: ReconcilePolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/roomwatch.db"),
            reconcile_policy: ReconcilePolicy::default(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Recipient address for vacancy alerts
    pub recipient: Option<String>,

    /// Mail relay endpoint receiving alerts as JSON
    pub webhook_url: Option<String>,

    /// Bearer token for the relay
    pub webhook_token: Option<String>,

    /// Relay request timeout in seconds
    pub timeout_secs: u64,

    /// Also write every alert to the log
    pub log_alerts: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            recipient: None,
            webhook_url: None,
            webhook_token: None,
            timeout_secs: 10,
            log_alerts: true,
        }
    }
}

/// Cycle cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Minutes between cycle starts
    pub interval_mins: u64,

    /// Run a cycle immediately instead of waiting for the first interval
    pub run_on_startup: bool,
}

impl ScheduleConfig {
    /// Get cycle interval as Duration
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins.saturating_mul(60))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_mins: 30,
            run_on_startup: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let urls = std::env::var("ROOMWATCH_TARGET_URLS")
            .map(|raw| split_targets(&raw))
            .unwrap_or_default();

        let request_timeout_ms = std::env::var("ROOMWATCH_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.crawler.request_timeout_ms);

        let rate_limit = std::env::var("ROOMWATCH_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.crawler.rate_limit);

        let max_retries = std::env::var("ROOMWATCH_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.crawler.max_retries);

        let user_agent = std::env::var("ROOMWATCH_USER_AGENT").ok();

        let sqlite_path = std::env::var("ROOMWATCH_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.sqlite_path);

        let reconcile_policy = match std::env::var("ROOMWATCH_RECONCILE_POLICY") {
            Ok(raw) => raw
                .parse::<ReconcilePolicy>()
                .map_err(|e| anyhow::anyhow!(e))
                .context("Invalid ROOMWATCH_RECONCILE_POLICY")?,
            Err(_) => defaults.storage.reconcile_policy,
        };

        let recipient = std::env::var("ROOMWATCH_NOTIFY_RECIPIENT").ok();
        let webhook_url = std::env::var("ROOMWATCH_WEBHOOK_URL").ok();
        let webhook_token = std::env::var("ROOMWATCH_WEBHOOK_TOKEN").ok();

        let interval_mins = std::env::var("ROOMWATCH_INTERVAL_MINS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.schedule.interval_mins);

        let log_level =
            std::env::var("ROOMWATCH_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let log_format =
            std::env::var("ROOMWATCH_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            targets: TargetsConfig { urls },
            extractor: ExtractorConfig::default(),
            crawler: CrawlerConfig {
                request_timeout_ms,
                user_agent,
                rate_limit,
                max_retries,
                ..defaults.crawler
            },
            storage: StorageConfig {
                sqlite_path,
                reconcile_policy,
            },
            notify: NotifyConfig {
                recipient,
                webhook_url,
                webhook_token,
                ..defaults.notify
            },
            schedule: ScheduleConfig {
                interval_mins,
                ..defaults.schedule
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.targets.urls.is_empty() {
            anyhow::bail!("at least one target URL must be configured");
        }

        for target in &self.targets.urls {
            validate_http_url(target).with_context(|| format!("Invalid target URL: {target}"))?;
        }

        if self.crawler.request_timeout_ms == 0 {
            anyhow::bail!("request_timeout_ms must be greater than 0");
        }

        if self.crawler.max_retries > MAX_RETRIES_LIMIT {
            anyhow::bail!("max_retries must be at most {MAX_RETRIES_LIMIT}");
        }

        if self.crawler.rate_limit == 0 {
            anyhow::bail!("rate_limit must be positive");
        }

        if self.crawler.max_concurrent_fetches == 0 {
            anyhow::bail!("max_concurrent_fetches must be greater than 0");
        }

        if self.schedule.interval_mins == 0 {
            anyhow::bail!("interval_mins must be greater than 0");
        }

        if let Some(webhook) = &self.notify.webhook_url {
            validate_http_url(webhook).context("Invalid notify.webhook_url")?;
            if self.notify.recipient.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("notify.recipient is required when a webhook relay is configured");
            }
        }

        Ok(())
    }

}

fn validate_http_url(raw: &str) -> Result<()> {
    let parsed = Url::parse(raw)?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("unsupported scheme '{other}'"),
    }
}
