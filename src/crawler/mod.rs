//! Listing page retrieval and the scrape cycle
//!
//! [`PageFetcher`] is the seam between the cycle and the network: the
//! production [`fetcher::HttpFetcher`] talks HTTP, tests substitute canned
//! pages.

pub mod cycle;
pub mod fetcher;

use async_trait::async_trait;

use crate::utils::error::FetchError;

pub use cycle::ScrapeCycle;
pub use fetcher::HttpFetcher;

/// Retrieves the markup of one target page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its decoded body
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
