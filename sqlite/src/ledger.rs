//! Ledger of ingested and failed input files.
//!
//! The `processed_files` table is the only authority on what has been
//! loaded: a file is skipped if and only if the ledger says so, regardless of
//! where the file currently sits on disk. Every decision queries the table;
//! nothing is cached between calls.
//!
//! A file is not pending when any of these hold:
//!
//! - its key is already in `processed_files`,
//! - its key is marked in `failed_files` (cleared only by an operator),
//! - its date range overlaps the range of a processed file.
//!
//! # Example
//!
//! ```no_run
//! use mlb_stats_core::FileKey;
//! use mlb_stats_sqlite::{IngestionTracker, Migration};
//! use rusqlite::Connection;
//!
//! let mut migration = Migration::new(Connection::open("mlb.db").unwrap(), "mlb_").unwrap();
//! migration.ensure_schema().unwrap();
//! let tracker = IngestionTracker::new(migration.connection(), "mlb_").unwrap();
//!
//! let candidates = vec![FileKey::parse("mlb_raw_2024-04-01_2024-04-07_20240408.json")];
//! for key in tracker.list_unprocessed(candidates).unwrap() {
//!     println!("pending: {key}");
//! }
//! ```

use chrono::{SecondsFormat, Utc};
use mlb_stats_core::{DateRange, FileKey};
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use crate::error::{Result, SqliteError};
use crate::schema::validate_prefix;

/// Why a candidate file is not pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The same key is already in the ledger.
    AlreadyProcessed,
    /// The file's range overlaps the range of `existing`.
    OverlapsProcessed { existing: String },
    /// The file failed before and awaits operator review.
    PreviouslyFailed { error_kind: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyProcessed => f.write_str("already processed"),
            SkipReason::OverlapsProcessed { existing } => {
                write!(f, "date range overlaps processed file {existing}")
            }
            SkipReason::PreviouslyFailed { error_kind } => {
                write!(f, "previously failed ({error_kind}), awaiting review")
            }
        }
    }
}

/// Candidates split into pending files and skipped files, order preserved.
#[derive(Debug)]
pub struct Partition<T> {
    pub pending: Vec<T>,
    pub skipped: Vec<(T, SkipReason)>,
}

/// Row counts recorded with a processed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessedCounts {
    pub teams: usize,
    pub players: usize,
    pub games: usize,
    pub batter_stats: usize,
    pub pitcher_stats: usize,
    /// Sub-records dropped by the transform or for unresolved references.
    pub dropped: usize,
}

/// One row of the `processed_files` ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub file_key: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub processed_at: String,
    pub checksum: Option<String>,
    pub counts: ProcessedCounts,
}

/// One row of the `failed_files` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub file_key: String,
    pub failed_at: String,
    pub error_kind: String,
    pub message: String,
}

/// Reads and writes the ingestion ledger.
pub struct IngestionTracker<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> IngestionTracker<'a> {
    /// Creates a tracker for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Returns the candidates that still need loading, in input order.
    pub fn list_unprocessed<T: AsRef<FileKey>>(&self, candidates: Vec<T>) -> Result<Vec<T>> {
        Ok(self.partition(candidates)?.pending)
    }

    /// Splits candidates into pending and skipped, preserving input order.
    pub fn partition<T: AsRef<FileKey>>(&self, candidates: Vec<T>) -> Result<Partition<T>> {
        let mut partition = Partition {
            pending: Vec::new(),
            skipped: Vec::new(),
        };
        for candidate in candidates {
            match self.check(candidate.as_ref())? {
                None => partition.pending.push(candidate),
                Some(reason) => partition.skipped.push((candidate, reason)),
            }
        }
        Ok(partition)
    }

    /// Decides whether one file is pending; `None` means it should be loaded.
    pub fn check(&self, key: &FileKey) -> Result<Option<SkipReason>> {
        if self.is_processed(key.as_str())? {
            return Ok(Some(SkipReason::AlreadyProcessed));
        }
        if let Some(error_kind) = self.failure_kind(key.as_str())? {
            return Ok(Some(SkipReason::PreviouslyFailed { error_kind }));
        }
        if let Some(range) = key.range() {
            if let Some(existing) = overlapping_file(self.conn, &self.prefix, &range)? {
                return Ok(Some(SkipReason::OverlapsProcessed { existing }));
            }
        }
        Ok(None)
    }

    /// Records `key` as processed inside the loader's open transaction.
    ///
    /// The overlap rule is re-checked against the transaction's view of the
    /// ledger so two overlapping files can never both be committed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::OverlappingRange`] if the range overlaps an
    /// existing entry, or [`SqliteError::DuplicateKey`] if the key is
    /// already recorded.
    pub fn mark_processed(
        &self,
        tx: &Transaction<'_>,
        key: &FileKey,
        checksum: Option<&str>,
        counts: &ProcessedCounts,
    ) -> Result<()> {
        if let Some(range) = key.range() {
            if let Some(existing) = overlapping_file(tx, &self.prefix, &range)? {
                return Err(SqliteError::OverlappingRange {
                    file_key: key.to_string(),
                    existing,
                });
            }
        }

        let table = format!("{}processed_files", self.prefix);
        let range = key.range();
        tx.execute(
            &format!(
                "INSERT INTO {table} (file_key, start_date, end_date, processed_at, checksum, \
                 teams, players, games, batter_stats, pitcher_stats, dropped) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                key.as_str(),
                range.map(|r| r.start.to_string()),
                range.map(|r| r.end.to_string()),
                now(),
                checksum,
                counts.teams as i64,
                counts.players as i64,
                counts.games as i64,
                counts.batter_stats as i64,
                counts.pitcher_stats as i64,
                counts.dropped as i64,
            ],
        )
        .map_err(|e| SqliteError::from_write(&table, e))?;
        Ok(())
    }

    /// Marks `key` as failed, replacing any earlier failure for the same key.
    pub fn mark_failed(&self, key: &FileKey, error_kind: &str, message: &str) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {}failed_files (file_key, failed_at, error_kind, message) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(file_key) DO UPDATE SET \
                 failed_at = excluded.failed_at, error_kind = excluded.error_kind, \
                 message = excluded.message",
                self.prefix
            ),
            params![key.as_str(), now(), error_kind, message],
        )?;
        Ok(())
    }

    /// Removes a failure mark so the next run retries the file.
    ///
    /// Returns `false` if the key was not marked failed.
    pub fn clear_failure(&self, file_key: &str) -> Result<bool> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {}failed_files WHERE file_key = ?1", self.prefix),
            params![file_key],
        )?;
        Ok(rows > 0)
    }

    /// Lists processed files ordered by key.
    pub fn processed_files(&self) -> Result<Vec<ProcessedFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT file_key, start_date, end_date, processed_at, checksum, \
             teams, players, games, batter_stats, pitcher_stats, dropped \
             FROM {}processed_files ORDER BY file_key",
            self.prefix
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProcessedFile {
                    file_key: row.get(0)?,
                    start_date: row.get(1)?,
                    end_date: row.get(2)?,
                    processed_at: row.get(3)?,
                    checksum: row.get(4)?,
                    counts: ProcessedCounts {
                        teams: row.get::<_, i64>(5)? as usize,
                        players: row.get::<_, i64>(6)? as usize,
                        games: row.get::<_, i64>(7)? as usize,
                        batter_stats: row.get::<_, i64>(8)? as usize,
                        pitcher_stats: row.get::<_, i64>(9)? as usize,
                        dropped: row.get::<_, i64>(10)? as usize,
                    },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Lists files awaiting operator review, ordered by key.
    pub fn failed_files(&self) -> Result<Vec<FailedFile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT file_key, failed_at, error_kind, message FROM {}failed_files ORDER BY file_key",
            self.prefix
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(FailedFile {
                    file_key: row.get(0)?,
                    failed_at: row.get(1)?,
                    error_kind: row.get(2)?,
                    message: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn is_processed(&self, file_key: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {}processed_files WHERE file_key = ?1",
                    self.prefix
                ),
                params![file_key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn failure_kind(&self, file_key: &str) -> Result<Option<String>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT error_kind FROM {}failed_files WHERE file_key = ?1",
                    self.prefix
                ),
                params![file_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind)
    }
}

/// First processed file whose closed range intersects `range`.
fn overlapping_file(conn: &Connection, prefix: &str, range: &DateRange) -> Result<Option<String>> {
    let existing: Option<String> = conn
        .query_row(
            &format!(
                "SELECT file_key FROM {prefix}processed_files \
                 WHERE start_date IS NOT NULL AND ?1 <= end_date AND ?2 >= start_date \
                 ORDER BY file_key LIMIT 1"
            ),
            params![range.start.to_string(), range.end.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(existing)
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
