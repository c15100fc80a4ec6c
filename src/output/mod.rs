//! Output module for reporting runs and catalog state
//!
//! This module handles printing run summaries, catalog statistics and entry
//! listings for the command-line interface.

pub mod stats;

pub use stats::{
    load_statistics, print_entries, print_run_summary, print_statistics, CatalogStatistics,
};
