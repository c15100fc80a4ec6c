//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog and run statistics from the storage layer.

use crate::catalog::CatalogEntry;
use crate::crawler::RunSummary;
use crate::state::LifecycleStatus;
use crate::storage::{CatalogStore, RunRecord, StorageResult};
use std::collections::HashMap;

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Total number of catalog entries
    pub total_entries: u64,

    /// Count of entries by lifecycle status
    pub entries_by_status: HashMap<LifecycleStatus, u64>,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,
}

impl CatalogStatistics {
    pub fn count(&self, status: LifecycleStatus) -> u64 {
        self.entries_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `recent_runs` - How many ledger rows to include
pub fn load_statistics(
    storage: &dyn CatalogStore,
    recent_runs: usize,
) -> StorageResult<CatalogStatistics> {
    Ok(CatalogStatistics {
        total_entries: storage.count_entries()?,
        entries_by_status: storage.count_by_status()?,
        recent_runs: storage.latest_runs(recent_runs)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Entries: {}", stats.total_entries);
    for status in LifecycleStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_entries > 0 {
            (count as f64 / stats.total_entries as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "  {:<9} {:>6} ({:.1}%)",
            status.to_db_string(),
            count,
            percentage
        );
    }
    println!();

    if stats.recent_runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    println!("Recent Runs:");
    for run in &stats.recent_runs {
        let duration = run
            .finished_at
            .map(|finished| format!("{}s", (finished - run.started_at).num_seconds()))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  #{} {} [{}] {} created={} updated={} touched={} skipped={} failed={} deferred={}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.status.to_db_string(),
            duration,
            run.created,
            run.updated,
            run.touched,
            run.skipped,
            run.failed,
            run.deferred
        );
        if let Some(error) = &run.error_message {
            println!("      error: {}", error);
        }
    }
}

/// Prints the outcome counts of one run
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Run Summary ===\n");
    println!("  Links discovered: {}", summary.discovered);
    println!("  Created:  {}", summary.created);
    println!("  Updated:  {}", summary.updated);
    println!("  Touched:  {}", summary.touched);
    println!("  Skipped:  {}", summary.skipped);
    println!("  Failed:   {}", summary.failed);
    println!("  Deferred: {}", summary.deferred);
}

/// Prints one line per entry
pub fn print_entries(entries: &[CatalogEntry]) {
    for entry in entries {
        println!(
            "  {} | {} | {} | {}",
            entry.occurs_at.format("%Y-%m-%d %H:%M"),
            entry.title,
            if entry.venue_name.is_empty() {
                "-"
            } else {
                entry.venue_name.as_str()
            },
            entry.source_url
        );
    }
}
