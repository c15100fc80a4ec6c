//! Storage traits and error types
//!
//! This module defines the trait interface for catalog backends and
//! associated error types.

use crate::catalog::CatalogEntry;
use crate::crawler::RunSummary;
use crate::state::LifecycleStatus;
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    /// A conditional write found a different revision than the one it read
    #[error("Write conflict for {0}")]
    Conflict(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog backend implementations
///
/// Writes are conditional on `CatalogEntry::revision` so that a read followed
/// by a write behaves atomically per source URL, even across processes.
pub trait CatalogStore {
    // ===== Catalog Entries =====

    /// Looks up the entry for a source URL
    fn find_by_source_url(&self, source_url: &str) -> StorageResult<Option<CatalogEntry>>;

    /// Writes an entry with compare-and-write semantics
    ///
    /// * revision 0: inserted only if no entry exists for the source URL
    /// * revision n: updated only if the stored revision is still n
    ///
    /// Either mismatch yields `StorageError::Conflict`. Operator fields are
    /// never written by this method.
    ///
    /// # Returns
    ///
    /// The entry as stored, carrying its new revision
    fn upsert(&mut self, entry: &CatalogEntry) -> StorageResult<CatalogEntry>;

    /// Transitions an entry to `imported` and stamps operator fields
    ///
    /// Returns `None` when no entry exists for the source URL.
    fn mark_imported(
        &mut self,
        source_url: &str,
        imported_by: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<CatalogEntry>>;

    /// Moves `new`/`updated` entries last seen before `seen_before` to `inactive`
    fn mark_stale_inactive(&mut self, seen_before: DateTime<Utc>) -> StorageResult<u64>;

    // ===== Statistics =====

    fn count_entries(&self) -> StorageResult<u64>;

    /// Counts entries by lifecycle status (statuses with no entries are omitted)
    fn count_by_status(&self) -> StorageResult<HashMap<LifecycleStatus, u64>>;

    /// Lists entries, optionally filtered by status, soonest event first
    fn list_entries(&self, status: Option<LifecycleStatus>) -> StorageResult<Vec<CatalogEntry>>;

    // ===== Run Ledger =====

    /// Records the start of an ingestion run and returns its ID
    fn begin_run(
        &mut self,
        source_name: &str,
        config_hash: &str,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Marks a run completed with its outcome counts
    fn finish_run(
        &mut self,
        run_id: i64,
        summary: &RunSummary,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Marks a run failed
    fn fail_run(
        &mut self,
        run_id: i64,
        message: &str,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Most recent runs, newest first
    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
