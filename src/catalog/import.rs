//! Operator import action
//!
//! Importing marks an entry as curated: from then on the reconciler only
//! advances its `last_seen_at`. The ingestion pipeline itself is never allowed
//! to import.

use crate::catalog::CatalogEntry;
use crate::storage::{CatalogStore, StorageError};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Who is asking for a catalog change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The ingestion pipeline
    Pipeline,

    /// A dashboard operator, identified by name or email
    Operator(String),
}

/// Reasons an import is refused
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("The ingestion pipeline cannot import catalog entries")]
    PipelineActor,

    #[error("Operator identity cannot be empty")]
    MissingOperator,

    #[error("No catalog entry for {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Transitions the entry for `source_url` to `imported`
///
/// Stamps `imported_at`, `imported_by` and `import_notes`. Importing an
/// already imported entry restamps those fields.
pub fn import_entry<S: CatalogStore + ?Sized>(
    store: &mut S,
    source_url: &str,
    actor: &Actor,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CatalogEntry, ImportError> {
    let operator = match actor {
        Actor::Pipeline => return Err(ImportError::PipelineActor),
        Actor::Operator(name) if name.trim().is_empty() => {
            return Err(ImportError::MissingOperator)
        }
        Actor::Operator(name) => name.trim(),
    };

    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    let entry = store
        .mark_imported(source_url, operator, notes, now)?
        .ok_or_else(|| ImportError::NotFound(source_url.to_string()))?;

    tracing::info!(url = source_url, operator, "Entry imported");
    Ok(entry)
}
