//! Reconciliation of candidate records against the catalog
//!
//! # Decision Table
//!
//! | Existing entry | Fingerprint | Action | Resulting status |
//! |----------------|-------------|--------|------------------|
//! | absent | - | Create | `new` |
//! | new / updated / inactive | unchanged | Touch | unchanged |
//! | new / updated / inactive | changed | Update | `updated` |
//! | imported | unchanged | Touch | `imported` |
//! | imported | changed | Touch (content kept) | `imported` |
//!
//! Every action advances `last_seen_at`. An imported entry's content and
//! fingerprint stay exactly as the operator curated them.

use crate::catalog::{fingerprint, CandidateRecord, CatalogEntry};
use crate::state::LifecycleStatus;
use crate::storage::{CatalogStore, StorageError};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Number of read-reconcile-write attempts before a conflict is surfaced
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// What the reconciler decided to do with a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileAction {
    /// First sighting: a new entry is written
    Create,

    /// Content changed: fields, fingerprint and `last_seen_at` are written
    Update,

    /// Only `last_seen_at` is written
    Touch,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Touch => "touch",
        };
        f.write_str(s)
    }
}

/// Decision plus the full entry to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub action: ReconcileAction,
    pub entry: CatalogEntry,
}

/// Inputs the reconciler needs besides the two records
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    pub now: DateTime<Utc>,

    /// City assigned to entries created from pages that name none
    pub default_city: &'a str,
}

/// A candidate the reconciler refuses to write
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Candidate for {candidate} reconciled against entry for {existing}")]
    SourceMismatch { candidate: String, existing: String },
}

/// Failure of a reconcile-and-store pass
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Decides the action for `candidate` given the catalog's current entry
///
/// This is a pure function: it computes the entry to write and never touches
/// storage.
pub fn reconcile(
    candidate: &CandidateRecord,
    existing: Option<&CatalogEntry>,
    ctx: &ReconcileContext<'_>,
) -> Result<Reconciliation, ReconcileError> {
    let incoming = fingerprint(candidate);

    let Some(existing) = existing else {
        return Ok(Reconciliation {
            action: ReconcileAction::Create,
            entry: CatalogEntry::from_candidate(candidate, incoming, ctx.default_city, ctx.now),
        });
    };

    if existing.source_url != candidate.source_url {
        return Err(ReconcileError::SourceMismatch {
            candidate: candidate.source_url.clone(),
            existing: existing.source_url.clone(),
        });
    }

    let mut entry = existing.clone();
    entry.last_seen_at = ctx.now;

    if incoming == existing.content_fingerprint || !existing.status.accepts_content_updates() {
        return Ok(Reconciliation {
            action: ReconcileAction::Touch,
            entry,
        });
    }

    entry.apply_content(candidate, incoming);
    entry.status = LifecycleStatus::Updated;

    Ok(Reconciliation {
        action: ReconcileAction::Update,
        entry,
    })
}

/// Reads the current entry, reconciles, and writes with a conditional upsert
///
/// When the write loses a race (another writer created or changed the entry
/// after it was read) the whole read-reconcile-write sequence is repeated, so
/// a racing create falls through to the touch/update path.
pub fn reconcile_and_store<S: CatalogStore + ?Sized>(
    store: &mut S,
    candidate: &CandidateRecord,
    ctx: &ReconcileContext<'_>,
) -> Result<Reconciliation, ApplyError> {
    let mut attempt = 1;

    loop {
        let existing = store.find_by_source_url(&candidate.source_url)?;
        let mut outcome = reconcile(candidate, existing.as_ref(), ctx)?;

        match store.upsert(&outcome.entry) {
            Ok(stored) => {
                outcome.entry = stored;
                return Ok(outcome);
            }
            Err(StorageError::Conflict(url)) if attempt < MAX_WRITE_ATTEMPTS => {
                tracing::debug!(url = %url, attempt, "Write conflict, re-reading entry");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
