//! Field extraction from event detail pages
//!
//! Fields are taken from the first matching element:
//!
//! | Field | Selector |
//! |-------|----------|
//! | title | `h1` |
//! | description | `p` |
//! | occurs_at | `time` (`datetime` attribute, else text) |
//! | venue_name | `address` |
//! | image_url | `img[src]` |

use crate::catalog::CandidateRecord;
use crate::config::Config;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Why a detail page yields no candidate record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnusableReason {
    #[error("page has no title")]
    MissingTitle,

    #[error("page has no event date")]
    MissingDate,

    #[error("unrecognised event date '{0}'")]
    UnparsableDate(String),
}

const LOCAL_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %B %Y %H:%M",
    "%d %B %Y, %H:%M",
    "%d %B %Y %I:%M %p",
    "%d %B %Y, %I:%M %p",
    "%B %d, %Y %H:%M",
    "%B %d, %Y, %H:%M",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y, %I:%M %p",
];

const LOCAL_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%B %d, %Y"];

/// Turns detail page HTML into candidate records for one source
#[derive(Debug, Clone)]
pub struct Extractor {
    source_name: String,
    offset: FixedOffset,
    description_max_length: usize,
}

impl Extractor {
    pub fn new(source_name: &str, offset: FixedOffset, description_max_length: usize) -> Self {
        Self {
            source_name: source_name.to_string(),
            offset,
            description_max_length,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.source.name,
            config.source.offset(),
            config.pipeline.description_max_length,
        )
    }

    /// Extracts a candidate record, or the reason the page is unusable
    pub fn extract(
        &self,
        html: &str,
        source_url: &Url,
        extracted_at: DateTime<Utc>,
    ) -> Result<CandidateRecord, UnusableReason> {
        let document = Html::parse_document(html);

        let title = first_text(&document, "h1")
            .map(|t| collapse_whitespace(&t))
            .filter(|t| !t.is_empty())
            .ok_or(UnusableReason::MissingTitle)?;

        let occurs_at = self.extract_occurs_at(&document)?;

        let description = first_text(&document, "p")
            .map(|d| truncate_chars(d.trim(), self.description_max_length))
            .unwrap_or_default();

        let venue_name = first_text(&document, "address")
            .map(|v| collapse_whitespace(&v))
            .unwrap_or_default();

        let image_url = first_element(&document, "img[src]")
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| source_url.join(src.trim()).ok())
            .map(|url| url.to_string());

        Ok(CandidateRecord {
            title,
            description,
            occurs_at,
            venue_name,
            image_url,
            source_url: source_url.to_string(),
            source_name: self.source_name.clone(),
            extracted_at,
        })
    }

    fn extract_occurs_at(&self, document: &Html) -> Result<DateTime<Utc>, UnusableReason> {
        let time = first_element(document, "time").ok_or(UnusableReason::MissingDate)?;

        let raw = time
            .value()
            .attr("datetime")
            .map(str::to_string)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| time.text().collect());
        let raw = collapse_whitespace(&raw);

        if raw.is_empty() {
            return Err(UnusableReason::MissingDate);
        }

        parse_occurs_at(&raw, self.offset).ok_or(UnusableReason::UnparsableDate(raw))
    }
}

/// Parses an event date, reading zone-less forms in `offset`
pub fn parse_occurs_at(text: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = LOCAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            LOCAL_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn first_element<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    first_element(document, selector).map(|element| element.text().collect())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
