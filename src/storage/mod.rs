//! Storage module for persisting the event catalog
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Conditional (revision-checked) catalog writes
//! - Operator import and staleness sweep updates
//! - The ingestion run ledger

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteCatalog;
pub use traits::{CatalogStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// Represents one ingestion run in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub source_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    pub status: RunStatus,
    pub discovered: u64,
    pub created: u64,
    pub updated: u64,
    pub touched: u64,
    pub skipped: u64,
    pub failed: u64,
    pub deferred: u64,
    pub error_message: Option<String>,
}

/// Status of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
