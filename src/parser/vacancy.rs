//! Vacancy extraction from listing pages
//!
//! A listing page carries one share-house title and any number of elements
//! flagged with a vacancy status marker. Each flagged element holds a list of
//! label/value entries; an element qualifies when one entry names the wanted
//! room type.

use chrono::{Local, NaiveDateTime};
use scraper::{ElementRef, Html};
use std::collections::BTreeSet;

use crate::config::ExtractorConfig;
use crate::models::{VacancyRecord, UNKNOWN_SHARE_HOUSE, VACANCY_STATUS};
use crate::parser::selectors::VacancySelectors;
use crate::utils::error::ParseError;
use crate::utils::normalize_whitespace;

/// Extracts qualifying vacancy records from listing markup
#[derive(Debug, Clone)]
pub struct VacancyExtractor {
    selectors: VacancySelectors,
    /// Lowercased room type label
    label: String,
    /// Lowercased wanted room type
    room_type: String,
}

impl VacancyExtractor {
    /// Extractor for the default listing layout ("Room type" = "Apartment")
    #[must_use]
    pub fn new() -> Self {
        let config = ExtractorConfig::default();
        Self {
            selectors: VacancySelectors::new(),
            label: config.room_type_label.to_lowercase(),
            room_type: config.room_type_value.to_lowercase(),
        }
    }

    /// Build an extractor from configuration
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` for unparsable selectors and
    /// `ParseError::EmptyMatchValue` for a blank label or room type
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ParseError> {
        let label = config.room_type_label.trim();
        if label.is_empty() {
            return Err(ParseError::EmptyMatchValue("room_type_label"));
        }

        let room_type = config.room_type_value.trim();
        if room_type.is_empty() {
            return Err(ParseError::EmptyMatchValue("room_type_value"));
        }

        Ok(Self {
            selectors: VacancySelectors::from_config(config)?,
            label: label.to_lowercase(),
            room_type: room_type.to_lowercase(),
        })
    }

    /// Extract records stamped with the current local time
    pub fn extract(&self, html: &str, source_url: &str) -> BTreeSet<VacancyRecord> {
        self.extract_at(html, source_url, Local::now().naive_local())
    }

    /// Extract records stamped with `observed_at`
    ///
    /// Never fails: elements without an id or with malformed entries are
    /// logged and skipped.
    pub fn extract_at(
        &self,
        html: &str,
        source_url: &str,
        observed_at: NaiveDateTime,
    ) -> BTreeSet<VacancyRecord> {
        let document = Html::parse_document(html);
        let source_url = source_url.trim();
        let share_house_name = self.share_house_name(&document);

        let mut records = BTreeSet::new();
        let mut flagged = 0usize;

        for element in document.select(&self.selectors.vacancy) {
            flagged += 1;

            let Some(vacancy_id) = element
                .value()
                .attr("id")
                .map(str::trim)
                .filter(|id| !id.is_empty())
            else {
                tracing::warn!(url = %source_url, "Vacancy element without id attribute, skipping");
                continue;
            };

            tracing::debug!(url = %source_url, vacancy_id, "Checking vacancy element");

            if let Some(room_type) = self.matching_room_type(element, vacancy_id) {
                tracing::info!(
                    url = %source_url,
                    share_house = %share_house_name,
                    vacancy_id,
                    room_type = %room_type,
                    "Matching vacancy found"
                );

                records.insert(VacancyRecord {
                    vacancy_id: vacancy_id.to_string(),
                    url: source_url.to_string(),
                    share_house_name: share_house_name.clone(),
                    room_type,
                    status: VACANCY_STATUS.to_string(),
                    observed_at,
                });
            }
        }

        tracing::debug!(
            url = %source_url,
            flagged,
            matched = records.len(),
            "Extraction finished"
        );

        records
    }

    /// Page-level share-house name, or the `Unknown` sentinel
    fn share_house_name(&self, document: &Html) -> String {
        document
            .select(&self.selectors.title)
            .next()
            .map(element_text)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                tracing::debug!("Share-house name not found");
                UNKNOWN_SHARE_HOUSE.to_string()
            })
    }

    /// First entry whose label and value both match, as found on the page
    fn matching_room_type(&self, element: ElementRef<'_>, vacancy_id: &str) -> Option<String> {
        for entry in element.select(&self.selectors.entry) {
            let (Some(label), Some(value)) = (
                entry.select(&self.selectors.label).next(),
                entry.select(&self.selectors.value).next(),
            ) else {
                tracing::trace!(vacancy_id, "Entry without label/value pair, skipping");
                continue;
            };

            let label = element_text(label);
            let value = element_text(value);

            tracing::trace!(vacancy_id, label = %label, value = %value, "Inspecting entry");

            if label.to_lowercase() == self.label && value.to_lowercase() == self.room_type {
                return Some(value);
            }
        }

        None
    }
}

impl Default for VacancyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}
