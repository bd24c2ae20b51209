//! CSS selectors for share-house listing pages
//!
//! Default selectors are compiled once; custom ones are built from
//! [`ExtractorConfig`] and validated up front.

use lazy_static::lazy_static;
use scraper::Selector;

use crate::config::ExtractorConfig;
use crate::utils::error::ParseError;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

lazy_static! {
    static ref DEFAULT_TITLE: Selector = parse_selector!("h1.p-description__name");
    static ref DEFAULT_VACANCY: Selector = parse_selector!("[data-status=vacancy]");
    static ref DEFAULT_ENTRY: Selector = parse_selector!("li.u-pc_only.has-label");
    static ref DEFAULT_LABEL: Selector = parse_selector!("strong");
    static ref DEFAULT_VALUE: Selector = parse_selector!("span");
}

/// Compiled selectors for one listing layout
#[derive(Debug, Clone)]
pub struct VacancySelectors {
    pub title: Selector,
    pub vacancy: Selector,
    pub entry: Selector,
    pub label: Selector,
    pub value: Selector,
}

impl VacancySelectors {
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: DEFAULT_TITLE.clone(),
            vacancy: DEFAULT_VACANCY.clone(),
            entry: DEFAULT_ENTRY.clone(),
            label: DEFAULT_LABEL.clone(),
            value: DEFAULT_VALUE.clone(),
        }
    }

    /// Compile selectors from configuration
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` naming the first selector that
    /// fails to parse
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ParseError> {
        Ok(Self {
            title: compile(&config.title_selector)?,
            vacancy: compile(&config.vacancy_selector)?,
            entry: compile(&config.entry_selector)?,
            label: compile(&config.label_selector)?,
            value: compile(&config.value_selector)?,
        })
    }
}

impl Default for VacancySelectors {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}
