use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

/// Main configuration structure for Marquee
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub pipeline: PipelineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// The event source being ingested
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Name recorded on every catalog entry (e.g. "TimeOut")
    pub name: String,

    /// Listing page the run starts from
    pub listing_url: String,

    /// Same-site rule: detail links must have a path starting with this prefix
    pub path_prefix: String,

    /// Links whose URL contains any of these substrings are index pages
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Minimum number of non-empty path segments for a detail page
    #[serde(default = "default_min_path_segments")]
    pub min_path_segments: usize,

    /// Region label for entries whose page does not name one
    pub default_city: String,

    /// Offset used for dates published without one, e.g. "+10:00"
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl SourceConfig {
    /// Parses `utc_offset`; falls back to UTC when it is malformed
    ///
    /// Validation rejects malformed offsets, so the fallback is only reached
    /// for configs built in code.
    pub fn offset(&self) -> FixedOffset {
        parse_utc_offset(&self.utc_offset).unwrap_or_else(|| Utc.fix())
    }
}

/// Run bounds and extraction limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PipelineConfig {
    /// Only the first N discovered links are fetched per run
    pub max_links_per_run: usize,

    /// Detail pages processed at the same time
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Timeout applied to every single request (seconds)
    pub fetch_timeout_secs: u64,

    /// Stop starting new detail fetches after this many seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Descriptions are truncated to this many characters
    #[serde(default = "default_description_max_length")]
    pub description_max_length: usize,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Catalog persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Entries unseen for this long are swept to `inactive`
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

/// Cadence for `--watch` mode
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_min_path_segments() -> usize {
    3
}

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_description_max_length() -> usize {
    300
}

fn default_stale_after_hours() -> u64 {
    72
}

fn default_interval_minutes() -> u64 {
    360
}

/// Parses an offset of the form `+HH:MM` / `-HH:MM`
pub(crate) fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = rest.split_once(':')?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
