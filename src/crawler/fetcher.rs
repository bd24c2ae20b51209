//! HTTP fetcher with rate limiting and charset detection
//!
//! This module provides the production [`PageFetcher`] for listing pages
//! with features including:
//! - User-Agent rotation (or a fixed, configured agent)
//! - Rate limiting with governor
//! - Automatic retry with exponential backoff
//! - Charset detection from the Content-Type header or a meta tag

use async_trait::async_trait;
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT},
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::CrawlerConfig;
use crate::crawler::PageFetcher;
use crate::utils::error::FetchError;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bytes inspected for a `<meta charset>` declaration
const META_SNIFF_LEN: usize = 1024;

/// Listing page fetcher
///
/// Handles rate limiting, retry logic and non-UTF-8 pages.
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Fixed user agent; rotates through [`USER_AGENTS`] when unset
    user_agent: Option<HeaderValue>,

    /// Maximum number of retry attempts for failed requests
    max_retries: u32,

    /// Base delay for exponential backoff
    base_delay: Duration,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new() -> Result<Self, FetchError> {
        Self::from_config(&CrawlerConfig::default())
    }

    /// Create a fetcher from crawler configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        let user_agent = config
            .user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .and_then(|ua| match HeaderValue::from_str(ua) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(user_agent = ua, "Invalid user agent, rotating defaults instead");
                    None
                }
            });

        Ok(Self {
            client,
            rate_limiter,
            user_agent,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(1000),
        })
    }

    /// Override the backoff base delay
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Fetch with exponential backoff retry logic
    ///
    /// Every attempt waits for the rate limiter first.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Timeout` if the last attempt timed out,
    /// `FetchError::MaxRetriesExceeded` if all retries fail otherwise, and the
    /// status error directly for non-retryable responses
    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut timed_out = false;

        for attempt in 0..=self.max_retries {
            // Apply exponential backoff for retries
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                tracing::debug!(url, attempt, delay_ms = delay.as_millis() as u64, "Retrying fetch");
                tokio::time::sleep(delay).await;
            }

            self.rate_limiter.until_ready().await;

            match self
                .client
                .get(url)
                .headers(self.build_headers())
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    timed_out = false;

                    if status.is_success() {
                        return self.decode_response(response).await;
                    } else if Self::should_retry(status.as_u16()) {
                        tracing::warn!(url, status = status.as_u16(), attempt, "Retryable response");
                        continue;
                    } else {
                        return Err(FetchError::ServerError(status.as_u16()));
                    }
                }
                Err(e) => {
                    timed_out = e.is_timeout();
                    if timed_out {
                        tracing::warn!(url, attempt, "Request timed out");
                    } else if e.is_builder() {
                        return Err(FetchError::InvalidUrl(url.to_string()));
                    } else {
                        tracing::warn!(url, attempt, error = %e, "Request failed");
                    }
                }
            }
        }

        if timed_out {
            Err(FetchError::Timeout)
        } else {
            Err(FetchError::MaxRetriesExceeded)
        }
    }

    /// Delay before retry `attempt` (1-based), doubling up to [`MAX_BACKOFF`]
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Determine if a status code should trigger a retry
    ///
    /// Retry on 429 and the transient 5xx codes; everything else is final.
    fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await?;

        self.decode_bytes(&bytes, &content_type)
    }

    /// Decode bytes to a string with encoding detection
    ///
    /// Tries, in order:
    /// 1. The charset named by the Content-Type header
    /// 2. A `<meta charset>` declaration near the start of the page
    /// 3. UTF-8
    /// 4. Shift_JIS
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Decode` if no strategy decodes cleanly
    pub fn decode_bytes(&self, bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        if let Some(encoding) = charset_param(content_type).and_then(|label| {
            Encoding::for_label(label.as_bytes())
        }) {
            return decode_with(encoding, bytes);
        }

        let head = &bytes[..bytes.len().min(META_SNIFF_LEN)];
        if let Some(encoding) = meta_charset(head) {
            return decode_with(encoding, bytes);
        }

        decode_with(UTF_8, bytes).or_else(|_| decode_with(SHIFT_JIS, bytes))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| HeaderValue::from_static(random_user_agent()));
        headers.insert(USER_AGENT, user_agent);

        // Standard browser headers
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9,ja;q=0.8"),
        );

        headers
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "Fetching listing page");
        self.fetch_with_retry(url).await
    }
}

/// Get a random user agent from the pool
fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn meta_charset(head: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(head).to_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    Encoding::for_label(label.as_bytes())
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, FetchError> {
    let (cow, _encoding, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode(format!(
            "{} decoding errors",
            encoding.name()
        )));
    }

    Ok(cow.into_owned())
}
