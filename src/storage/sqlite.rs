//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CatalogStore trait.
//! Timestamps are stored as fixed-width RFC 3339 strings (UTC, microseconds)
//! so that text comparison orders them chronologically.

use crate::catalog::{CatalogEntry, Fingerprint};
use crate::crawler::RunSummary;
use crate::state::LifecycleStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CatalogStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const ENTRY_COLUMNS: &str = "source_url, title, description, occurs_at, venue_name, image_url,
     source_name, extracted_at, city, content_fingerprint, first_seen_at, last_seen_at,
     status, imported_at, imported_by, import_notes, revision";

const RUN_COLUMNS: &str = "id, source_name, started_at, finished_at, config_hash, status,
     discovered, created, updated, touched, skipped, failed, deferred, error_message";

/// SQLite catalog backend
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    /// Creates a new SqliteCatalog instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCatalog)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory catalog (dry runs and tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn insert_entry(&self, entry: &CatalogEntry) -> StorageResult<()> {
        let sql = format!(
            "INSERT INTO events ({}) VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, NULL, NULL, 1)",
            ENTRY_COLUMNS
        );

        let result = self.conn.execute(
            &sql,
            params![
                entry.source_url,
                entry.title,
                entry.description,
                encode_time(&entry.occurs_at),
                entry.venue_name,
                entry.image_url,
                entry.source_name,
                encode_time(&entry.extracted_at),
                entry.city,
                entry.content_fingerprint.as_str(),
                encode_time(&entry.first_seen_at),
                encode_time(&entry.last_seen_at),
                entry.status.to_db_string(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Conflict(entry.source_url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_entry(&self, entry: &CatalogEntry) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE events SET title = ?1, description = ?2, occurs_at = ?3, venue_name = ?4,
             image_url = ?5, source_name = ?6, extracted_at = ?7, content_fingerprint = ?8,
             last_seen_at = ?9, status = ?10, revision = revision + 1
             WHERE source_url = ?11 AND revision = ?12",
            params![
                entry.title,
                entry.description,
                encode_time(&entry.occurs_at),
                entry.venue_name,
                entry.image_url,
                entry.source_name,
                encode_time(&entry.extracted_at),
                entry.content_fingerprint.as_str(),
                encode_time(&entry.last_seen_at),
                entry.status.to_db_string(),
                entry.source_url,
                entry.revision as i64,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::Conflict(entry.source_url.clone()));
        }
        Ok(())
    }

    fn reload(&self, source_url: &str) -> StorageResult<CatalogEntry> {
        self.find_by_source_url(source_url)?
            .ok_or_else(|| StorageError::Database(format!("Entry vanished after write: {}", source_url)))
    }
}

impl CatalogStore for SqliteCatalog {
    // ===== Catalog Entries =====

    fn find_by_source_url(&self, source_url: &str) -> StorageResult<Option<CatalogEntry>> {
        let sql = format!("SELECT {} FROM events WHERE source_url = ?1", ENTRY_COLUMNS);
        let entry = self
            .conn
            .query_row(&sql, params![source_url], entry_from_row)
            .optional()?;
        Ok(entry)
    }

    fn upsert(&mut self, entry: &CatalogEntry) -> StorageResult<CatalogEntry> {
        if entry.is_persisted() {
            self.update_entry(entry)?;
        } else {
            self.insert_entry(entry)?;
        }
        self.reload(&entry.source_url)
    }

    fn mark_imported(
        &mut self,
        source_url: &str,
        imported_by: &str,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> StorageResult<Option<CatalogEntry>> {
        let changed = self.conn.execute(
            "UPDATE events SET status = ?1, imported_at = ?2, imported_by = ?3, import_notes = ?4,
             revision = revision + 1
             WHERE source_url = ?5",
            params![
                LifecycleStatus::Imported.to_db_string(),
                encode_time(&at),
                imported_by,
                notes,
                source_url,
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        self.reload(source_url).map(Some)
    }

    fn mark_stale_inactive(&mut self, seen_before: DateTime<Utc>) -> StorageResult<u64> {
        let sweepable: Vec<&str> = LifecycleStatus::all()
            .into_iter()
            .filter(LifecycleStatus::is_sweepable)
            .map(|status| status.to_db_string())
            .collect();
        let placeholders = vec!["?"; sweepable.len()].join(", ");
        let sql = format!(
            "UPDATE events SET status = ?, revision = revision + 1
             WHERE status IN ({}) AND last_seen_at < ?",
            placeholders
        );

        let cutoff = encode_time(&seen_before);
        let values = std::iter::once(LifecycleStatus::Inactive.to_db_string())
            .chain(sweepable)
            .chain(std::iter::once(cutoff.as_str()));
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed as u64)
    }

    // ===== Statistics =====

    fn count_entries(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_status(&self) -> StorageResult<HashMap<LifecycleStatus, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM events GROUP BY status")?;

        let rows = stmt.query_map([], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((status, count))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status_str, count) = row?;
            let status = LifecycleStatus::from_db_string(&status_str)
                .ok_or_else(|| StorageError::Corrupt(format!("unknown status '{}'", status_str)))?;
            counts.insert(status, count as u64);
        }

        Ok(counts)
    }

    fn list_entries(&self, status: Option<LifecycleStatus>) -> StorageResult<Vec<CatalogEntry>> {
        let entries = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM events WHERE status = ?1 ORDER BY occurs_at, source_url",
                    ENTRY_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![status.to_db_string()], entry_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM events ORDER BY occurs_at, source_url",
                    ENTRY_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], entry_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(entries)
    }

    // ===== Run Ledger =====

    fn begin_run(
        &mut self,
        source_name: &str,
        config_hash: &str,
        started_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (source_name, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                source_name,
                encode_time(&started_at),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        summary: &RunSummary,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, discovered = ?3, created = ?4,
             updated = ?5, touched = ?6, skipped = ?7, failed = ?8, deferred = ?9
             WHERE id = ?10",
            params![
                RunStatus::Completed.to_db_string(),
                encode_time(&finished_at),
                summary.discovered as i64,
                summary.created as i64,
                summary.updated as i64,
                summary.touched as i64,
                summary.skipped as i64,
                summary.failed as i64,
                summary.deferred as i64,
                run_id,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(
        &mut self,
        run_id: i64,
        message: &str,
        finished_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![
                RunStatus::Failed.to_db_string(),
                encode_time(&finished_at),
                message,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn latest_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

fn encode_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn decode_optional_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => decode_time(row, idx).map(Some),
        None => Ok(None),
    }
}

fn decode_count(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    let status_str: String = row.get(12)?;
    let status = LifecycleStatus::from_db_string(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            Type::Text,
            format!("unknown status '{}'", status_str).into(),
        )
    })?;

    Ok(CatalogEntry {
        source_url: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        occurs_at: decode_time(row, 3)?,
        venue_name: row.get(4)?,
        image_url: row.get(5)?,
        source_name: row.get(6)?,
        extracted_at: decode_time(row, 7)?,
        city: row.get(8)?,
        content_fingerprint: Fingerprint::from_hex(row.get::<_, String>(9)?),
        first_seen_at: decode_time(row, 10)?,
        last_seen_at: decode_time(row, 11)?,
        status,
        imported_at: decode_optional_time(row, 13)?,
        imported_by: row.get(14)?,
        import_notes: row.get(15)?,
        revision: decode_count(row, 16)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let status_str: String = row.get(5)?;
    let status = RunStatus::from_db_string(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            format!("unknown run status '{}'", status_str).into(),
        )
    })?;

    Ok(RunRecord {
        id: row.get(0)?,
        source_name: row.get(1)?,
        started_at: decode_time(row, 2)?,
        finished_at: decode_optional_time(row, 3)?,
        config_hash: row.get(4)?,
        status,
        discovered: decode_count(row, 6)?,
        created: decode_count(row, 7)?,
        updated: decode_count(row, 8)?,
        touched: decode_count(row, 9)?,
        skipped: decode_count(row, 10)?,
        failed: decode_count(row, 11)?,
        deferred: decode_count(row, 12)?,
        error_message: row.get(13)?,
    })
}
