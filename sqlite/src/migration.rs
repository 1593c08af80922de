//! Schema lifecycle operations for the statistics store.
//!
//! Provides [`Migration`] for creating, verifying, and dropping the
//! normalized table structure. All mutation operations use transactions to
//! ensure atomicity.
//!
//! # Example
//!
//! ```no_run
//! use mlb_stats_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("mlb.db").unwrap();
//! let mut migration = Migration::new(conn, "mlb_").unwrap();
//!
//! // Create tables (safe on every run) and check the stored version
//! migration.ensure_schema().unwrap();
//!
//! let status = migration.status().unwrap();
//! println!("{} games loaded", status.game_count);
//! ```

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, SqliteError};
use crate::schema::{SCHEMA_VERSION, TABLES, generate_drop_sql, generate_schema_sql, validate_prefix};

/// Manages the lifecycle of the store's tables.
///
/// Owns the connection the way the rest of a run uses it: create the
/// migration, call [`ensure_schema`](Self::ensure_schema), then hand the
/// connection to the loader via [`connection`](Self::connection) or
/// [`into_connection`](Self::into_connection).
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Creates a new migration manager for the given connection and table prefix.
    ///
    /// Enables foreign key enforcement on the connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Creates all tables, indexes, and uniqueness constraints.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` so it is safe to call on every run.
    /// Records [`SCHEMA_VERSION`] in `schema_meta` the first time.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Configuration`] if the statements fail.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::Configuration(format!("failed to create tables: {e}")))?;
        tx.execute(
            &format!(
                "INSERT INTO {}schema_meta (key, value) VALUES ('schema_version', ?1) \
                 ON CONFLICT(key) DO NOTHING",
                self.prefix
            ),
            params![SCHEMA_VERSION],
        )
        .map_err(|e| SqliteError::Configuration(format!("failed to record schema version: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Checks that every table exists and the stored schema version matches.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Configuration`] naming the first missing table
    /// or the mismatched version.
    pub fn verify(&self) -> Result<()> {
        for table in TABLES {
            if !self.table_exists(table)? {
                return Err(SqliteError::Configuration(format!(
                    "missing table {}{table}",
                    self.prefix
                )));
            }
        }
        match self.schema_version()? {
            Some(version) if version == SCHEMA_VERSION => Ok(()),
            Some(version) => Err(SqliteError::Configuration(format!(
                "schema version {version} found, expected {SCHEMA_VERSION}"
            ))),
            None => Err(SqliteError::Configuration(
                "schema version not recorded".to_string(),
            )),
        }
    }

    /// Creates the schema if absent and verifies it.
    ///
    /// This is the startup step of every ingestion run; any error it
    /// returns is fatal for the run.
    pub fn ensure_schema(&mut self) -> Result<()> {
        self.up()?;
        self.verify()
    }

    /// Drops all tables in reverse dependency order.
    ///
    /// Uses `DROP TABLE IF EXISTS` so it is safe to call even if tables
    /// do not exist. Executes within a transaction for atomicity.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::Configuration(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Returns table existence and row counts for each data table.
    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.table_exists("teams")? {
            return Ok(MigrationStatus::default());
        }

        Ok(MigrationStatus {
            tables_exist: true,
            schema_version: self.schema_version()?,
            team_count: self.count_rows("teams")?,
            player_count: self.count_rows("players")?,
            game_count: self.count_rows("games")?,
            batter_stat_count: self.count_rows("batter_stats")?,
            pitcher_stat_count: self.count_rows("pitcher_stats")?,
            processed_file_count: self.count_rows("processed_files")?,
            failed_file_count: self.count_rows("failed_files")?,
        })
    }

    /// Returns the table prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let table_name = format!("{}{table}", self.prefix);
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
        let count: i64 = stmt.query_row([&table_name], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn schema_version(&self) -> Result<Option<String>> {
        if !self.table_exists("schema_meta")? {
            return Ok(None);
        }
        let version: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT value FROM {}schema_meta WHERE key = 'schema_version'",
                    self.prefix
                ),
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let full_table = format!("{}{}", self.prefix, table);
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT COUNT(*) FROM {full_table}"))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Snapshot of the store returned by [`Migration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Whether the schema tables exist in the database.
    pub tables_exist: bool,
    pub schema_version: Option<String>,
    pub team_count: usize,
    pub player_count: usize,
    pub game_count: usize,
    pub batter_stat_count: usize,
    pub pitcher_stat_count: usize,
    pub processed_file_count: usize,
    pub failed_file_count: usize,
}
