//! One ingestion run over the pending directory.
//!
//! Files are handled strictly one at a time in file-name order:
//!
//! 1. the ledger is consulted for every candidate,
//! 2. each pending file is re-checked, read, checksummed, transformed, and
//!    loaded in its own transaction,
//! 3. committed files are archived.
//!
//! A failing file never stops the run. Malformed and duplicate-key failures
//! are recorded in the ledger for review; other failures are logged and the
//! file is retried on the next run.

use std::fmt;
use std::path::{Path, PathBuf};

use mlb_stats_core::{FileKey, transform_slice};
use mlb_stats_sqlite::{BatchLoader, IngestionTracker, LoadReport, Migration, SourceFile};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::lifecycle::{DirectoryArchiver, FileLifecycle, pending_files};

/// Totals for one [`Pipeline::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files committed in this run.
    pub processed: usize,
    pub failed: usize,
    /// Files the ledger said not to load.
    pub skipped: usize,
    /// Committed files that could not be moved to the done directory.
    pub archive_failures: usize,
    /// Rows written across all tables.
    pub rows: usize,
    /// Sub-records dropped by the transform or for unresolved references.
    pub dropped: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {} file(s), failed {}, skipped {}, archive failures {}; {} row(s) written, {} dropped",
            self.processed, self.failed, self.skipped, self.archive_failures, self.rows, self.dropped
        )
    }
}

/// A discovered input file.
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    key: FileKey,
}

impl AsRef<FileKey> for Candidate {
    fn as_ref(&self) -> &FileKey {
        &self.key
    }
}

/// Runs ingestion according to a [`PipelineConfig`].
///
/// # Examples
///
/// ```no_run
/// use mlb_stats_pipeline::{Pipeline, PipelineConfig};
///
/// let summary = Pipeline::new(PipelineConfig::default()).run().unwrap();
/// println!("{summary}");
/// ```
pub struct Pipeline<L = DirectoryArchiver> {
    config: PipelineConfig,
    lifecycle: L,
}

impl Pipeline<DirectoryArchiver> {
    /// Creates a pipeline that archives into the configured done directory.
    pub fn new(config: PipelineConfig) -> Self {
        let lifecycle = DirectoryArchiver::new(&config.done_dir);
        Self { config, lifecycle }
    }
}

impl<L: FileLifecycle> Pipeline<L> {
    pub fn with_lifecycle(config: PipelineConfig, lifecycle: L) -> Self {
        Self { config, lifecycle }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Opens the configured database and makes sure the schema is current.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if the database cannot be
    /// opened or its schema cannot be created or verified.
    pub fn open_store(&self) -> Result<Migration> {
        open_store(&self.config)
    }

    /// Loads every pending file and archives the committed ones.
    ///
    /// # Errors
    ///
    /// Only run-level failures are returned: invalid configuration, an
    /// unusable store, or an unreadable pending directory. Per-file errors
    /// are counted in the summary.
    pub fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;
        let migration = self.open_store()?;
        self.run_with(migration.connection())
    }

    /// Runs against an already prepared connection.
    pub fn run_with(&self, conn: &Connection) -> Result<RunSummary> {
        let tracker = IngestionTracker::new(conn, self.config.table_prefix.as_str())?;
        let loader = BatchLoader::new(conn, self.config.table_prefix.as_str())?
            .with_chunk_size(self.config.chunk_size);

        let candidates = discover(&self.config.pending_dir)?;
        info!(
            pending_dir = %self.config.pending_dir.display(),
            candidates = candidates.len(),
            "Starting ingestion run"
        );

        let partition = tracker.partition(candidates)?;
        let mut summary = RunSummary {
            skipped: partition.skipped.len(),
            ..Default::default()
        };
        for (candidate, reason) in &partition.skipped {
            info!(file_key = %candidate.key, %reason, "Skipping file");
        }

        for candidate in &partition.pending {
            match load_file(&tracker, &loader, candidate) {
                Ok(Some(loaded)) => {
                    summary.processed += 1;
                    summary.rows += loaded.rows();
                    summary.dropped += loaded.dropped;
                    match self.lifecycle.archive(&candidate.path) {
                        Ok(target) => {
                            debug!(file_key = %candidate.key, archived_to = %target.display(), "Archived file");
                        }
                        Err(err) => {
                            summary.archive_failures += 1;
                            warn!(file_key = %candidate.key, error = %err, "Committed file could not be archived");
                        }
                    }
                }
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    record_failure(&tracker, &candidate.key, &err);
                }
            }
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            skipped = summary.skipped,
            archive_failures = summary.archive_failures,
            "Ingestion run finished"
        );
        Ok(summary)
    }
}

/// Opens the store described by `config` with the schema ensured.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] naming the database path.
pub fn open_store(config: &PipelineConfig) -> Result<Migration> {
    let path = &config.database;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store_error =
        |e: &dyn fmt::Display| PipelineError::Configuration(format!("store {}: {e}", path.display()));

    let conn = Connection::open(path).map_err(|e| store_error(&e))?;
    let mut migration =
        Migration::new(conn, config.table_prefix.as_str()).map_err(|e| store_error(&e))?;
    migration.ensure_schema().map_err(|e| store_error(&e))?;
    Ok(migration)
}

/// Outcome of one committed file.
struct Loaded {
    report: LoadReport,
    dropped: usize,
}

impl Loaded {
    fn rows(&self) -> usize {
        let r = &self.report;
        r.teams + r.players + r.games + r.batter_stats + r.pitcher_stats
    }
}

fn discover(pending_dir: &Path) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for path in pending_files(pending_dir)? {
        match FileKey::from_path(&path) {
            Some(key) => {
                if key.range().is_none() {
                    debug!(file_key = %key, "File name carries no date range");
                }
                candidates.push(Candidate { path, key });
            }
            None => warn!(path = %path.display(), "Skipping file with a non UTF-8 name"),
        }
    }
    Ok(candidates)
}

/// Loads one file; `None` means the ledger changed its mind since discovery.
fn load_file(
    tracker: &IngestionTracker<'_>,
    loader: &BatchLoader<'_>,
    candidate: &Candidate,
) -> Result<Option<Loaded>> {
    if let Some(reason) = tracker.check(&candidate.key)? {
        info!(file_key = %candidate.key, %reason, "Skipping file");
        return Ok(None);
    }

    let bytes = std::fs::read(&candidate.path)?;
    let checksum = format!("{:x}", Sha256::digest(&bytes));
    let output = transform_slice(&bytes)?;
    for issue in &output.issues {
        warn!(file_key = %candidate.key, %issue, "Record issue");
    }

    let source = SourceFile {
        key: candidate.key.clone(),
        checksum: Some(checksum),
        dropped_records: output.dropped().total(),
    };
    let report = loader.load(&output.batch, &source)?;
    Ok(Some(Loaded {
        report,
        dropped: source.dropped_records + report.orphaned_games + report.orphaned_stats,
    }))
}

fn record_failure(tracker: &IngestionTracker<'_>, key: &FileKey, err: &PipelineError) {
    let kind = err.kind();
    error!(file_key = %key, kind = %kind, error = %err, "File failed");
    if !kind.requires_review() {
        return;
    }
    if let Err(mark_err) = tracker.mark_failed(key, kind.as_str(), &err.to_string()) {
        error!(file_key = %key, error = %mark_err, "Could not record failure");
    }
}
