//! Staleness sweep
//!
//! Runs outside ingestion: `run_once` never produces `inactive` entries.

use crate::storage::{CatalogStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Reasons a sweep cannot run
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Staleness window of {0} reaches outside the representable time range")]
    WindowOutOfRange(Duration),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Marks sweepable entries not seen within `window` as `inactive`
///
/// Imported entries are never swept. Returns the number of entries changed.
pub fn sweep_stale<S: CatalogStore + ?Sized>(
    store: &mut S,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<u64, SweepError> {
    let cutoff = now
        .checked_sub_signed(window)
        .ok_or(SweepError::WindowOutOfRange(window))?;
    let swept = store.mark_stale_inactive(cutoff)?;
    tracing::info!(swept, cutoff = %cutoff, "Staleness sweep finished");
    Ok(swept)
}
