//! Candidate and catalog records

use crate::catalog::Fingerprint;
use crate::state::LifecycleStatus;
use chrono::{DateTime, Utc};

/// Structured fields extracted from one detail page, not yet reconciled
///
/// Records reaching the reconciler always have a non-empty title and a valid
/// `occurs_at`; pages failing either check are dropped by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub title: String,
    pub description: String,
    pub occurs_at: DateTime<Utc>,
    pub venue_name: String,
    pub image_url: Option<String>,

    /// Natural key of the catalog
    pub source_url: String,
    pub source_name: String,
    pub extracted_at: DateTime<Utc>,
}

/// Durable representation of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub source_url: String,
    pub title: String,
    pub description: String,
    pub occurs_at: DateTime<Utc>,
    pub venue_name: String,
    pub image_url: Option<String>,
    pub source_name: String,
    pub extracted_at: DateTime<Utc>,
    pub city: String,

    pub content_fingerprint: Fingerprint,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: LifecycleStatus,

    // Operator-owned; only the import action writes these
    pub imported_at: Option<DateTime<Utc>>,
    pub imported_by: Option<String>,
    pub import_notes: Option<String>,

    /// Compare token for conditional writes; 0 until first persisted
    pub revision: u64,
}

impl CatalogEntry {
    /// Builds a never-persisted `New` entry from a candidate
    pub fn from_candidate(
        candidate: &CandidateRecord,
        fingerprint: Fingerprint,
        city: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            source_url: candidate.source_url.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            occurs_at: candidate.occurs_at,
            venue_name: candidate.venue_name.clone(),
            image_url: candidate.image_url.clone(),
            source_name: candidate.source_name.clone(),
            extracted_at: candidate.extracted_at,
            city: city.to_string(),
            content_fingerprint: fingerprint,
            first_seen_at: now,
            last_seen_at: now,
            status: LifecycleStatus::New,
            imported_at: None,
            imported_by: None,
            import_notes: None,
            revision: 0,
        }
    }

    /// Overwrites the extracted fields and fingerprint with a newer sighting
    ///
    /// `city`, status, timestamps and operator fields are left alone.
    pub(crate) fn apply_content(&mut self, candidate: &CandidateRecord, fingerprint: Fingerprint) {
        self.title = candidate.title.clone();
        self.description = candidate.description.clone();
        self.occurs_at = candidate.occurs_at;
        self.venue_name = candidate.venue_name.clone();
        self.image_url = candidate.image_url.clone();
        self.source_name = candidate.source_name.clone();
        self.extracted_at = candidate.extracted_at;
        self.content_fingerprint = fingerprint;
    }

    /// Returns true once the entry has been written to a store
    pub fn is_persisted(&self) -> bool {
        self.revision > 0
    }
}
