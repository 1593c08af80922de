//! SQLite storage for MLB game statistics.
//!
//! This crate owns everything that touches the database: the normalized
//! schema and its lifecycle, the ledger of ingested files, transactional
//! chunked loading of transformed batches, and the home-run co-occurrence
//! query.
//!
//! # Architecture
//!
//! - **`schema`**: DDL generation with customizable table prefixes
//! - **`migration`**: lifecycle operations (up/verify/down/status)
//! - **`convert`**: record to row mapping and chunked multi-row inserts
//! - **`ledger`**: processed and failed file tracking
//! - **`loader`**: one transaction per file, ledger entry included
//! - **`query`**: read-only co-occurrence ranking
//!
//! # Quick start
//!
//! ```no_run
//! use mlb_stats_core::{FileKey, transform_slice};
//! use mlb_stats_sqlite::{BatchLoader, IngestionTracker, Migration, SourceFile};
//! use rusqlite::Connection;
//!
//! let mut migration = Migration::new(Connection::open("mlb.db").unwrap(), "mlb_").unwrap();
//! migration.ensure_schema().unwrap();
//! let conn = migration.connection();
//!
//! let key = FileKey::parse("mlb_raw_2024-04-01_2024-04-07_20240408.json");
//! let tracker = IngestionTracker::new(conn, "mlb_").unwrap();
//! if tracker.check(&key).unwrap().is_none() {
//!     let bytes = std::fs::read("raw/mlb_raw_2024-04-01_2024-04-07_20240408.json").unwrap();
//!     let output = transform_slice(&bytes).unwrap();
//!     let loader = BatchLoader::new(conn, "mlb_").unwrap();
//!     loader.load(&output.batch, &SourceFile::new(key)).unwrap();
//! }
//! ```
//!
//! # Table prefix customization
//!
//! All table and index names are prefixed with a configurable string,
//! allowing several isolated stores within one SQLite database. Prefixes
//! must contain only alphanumeric characters and underscores.

mod convert;
mod error;
mod ledger;
mod loader;
mod migration;
mod query;
mod schema;

pub use convert::DEFAULT_CHUNK_SIZE;
pub use error::{Result, SqliteError};
pub use ledger::{
    FailedFile, IngestionTracker, Partition, ProcessedCounts, ProcessedFile, SkipReason,
};
pub use loader::{BatchLoader, LoadReport, SourceFile};
pub use migration::{Migration, MigrationStatus};
pub use query::{
    CooccurrenceQuery, DEFAULT_TOP_N, Grouping, HomeRunRow, PairCount, QueryOptions, rank_pairs,
};
pub use schema::{SCHEMA_VERSION, generate_drop_sql, generate_schema_sql};
