//! HTML parsing and data extraction
//!
//! This module handles parsing share-house listing pages and extracting
//! structured vacancy records.

pub mod selectors;
pub mod vacancy;

// Re-export main extractor and public types
pub use selectors::VacancySelectors;
pub use vacancy::VacancyExtractor;
