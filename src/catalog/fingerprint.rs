//! Content fingerprints for change detection
//!
//! A fingerprint covers exactly the fields that make an event "the same
//! event": title, start time, venue and description, in that order. Image and
//! source name changes do not affect it.

use crate::catalog::CandidateRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest over an event's meaningful fields
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps a digest read back from storage
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprints a candidate record
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use marquee::catalog::{fingerprint, CandidateRecord};
///
/// let record = CandidateRecord {
///     title: "Jazz Night".to_string(),
///     description: "Live trio".to_string(),
///     occurs_at: Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap(),
///     venue_name: "The Basement".to_string(),
///     image_url: None,
///     source_url: "https://example.com/sydney/music/jazz-night".to_string(),
///     source_name: "TimeOut".to_string(),
///     extracted_at: Utc::now(),
/// };
///
/// assert_eq!(fingerprint(&record), fingerprint(&record.clone()));
/// ```
pub fn fingerprint(record: &CandidateRecord) -> Fingerprint {
    fingerprint_fields(
        &record.title,
        record.occurs_at,
        &record.venue_name,
        &record.description,
    )
}

/// Fingerprints the four meaningful fields directly
pub fn fingerprint_fields(
    title: &str,
    occurs_at: DateTime<Utc>,
    venue_name: &str,
    description: &str,
) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(canonical_time(occurs_at).as_bytes());
    hasher.update(venue_name.as_bytes());
    hasher.update(description.as_bytes());
    Fingerprint(hex::encode(hasher.finalize()))
}

fn canonical_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
