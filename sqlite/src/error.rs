//! Error types for SQLite store operations.
//!
//! Provides a unified error type covering database access, schema setup,
//! constraint violations, and ledger consistency failures.

use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The schema could not be created or does not match the expected layout.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An insert violated a primary key or unique constraint.
    #[error("duplicate key in {table}: {detail}")]
    DuplicateKey { table: String, detail: String },

    /// An insert referenced a row that does not exist.
    #[error("foreign key violation in {table}: {detail}")]
    ForeignKey { table: String, detail: String },

    /// A file's date range overlaps one that is already in the ledger.
    #[error("file {file_key} overlaps already processed file {existing}")]
    OverlappingRange { file_key: String, existing: String },

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),
}

impl SqliteError {
    /// Classifies a failed write against `table`, separating constraint
    /// violations from other database errors.
    pub(crate) fn from_write(table: &str, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = err {
            if failure.code == ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                        return SqliteError::DuplicateKey {
                            table: table.to_string(),
                            detail,
                        };
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        return SqliteError::ForeignKey {
                            table: table.to_string(),
                            detail,
                        };
                    }
                    _ => {}
                }
            }
        }
        SqliteError::DatabaseError(err)
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_from_write_classifies_unique_violation() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE);")
            .unwrap();
        conn.execute("INSERT INTO t (id, name) VALUES (1, 'a')", []).unwrap();

        let err = conn
            .execute("INSERT INTO t (id, name) VALUES (1, 'b')", [])
            .unwrap_err();
        assert!(matches!(
            SqliteError::from_write("t", err),
            SqliteError::DuplicateKey { ref table, .. } if table == "t"
        ));

        let err = conn
            .execute("INSERT INTO t (id, name) VALUES (2, 'a')", [])
            .unwrap_err();
        assert!(matches!(
            SqliteError::from_write("t", err),
            SqliteError::DuplicateKey { .. }
        ));
    }

    #[test]
    fn test_from_write_classifies_foreign_key_violation() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (parent_id INTEGER REFERENCES parent(id));",
        )
        .unwrap();
        let err = conn
            .execute("INSERT INTO child (parent_id) VALUES (9)", [])
            .unwrap_err();
        assert!(matches!(
            SqliteError::from_write("child", err),
            SqliteError::ForeignKey { .. }
        ));
    }

    #[test]
    fn test_from_write_passes_through_other_errors() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("INSERT INTO missing VALUES (1)", []).unwrap_err();
        assert!(matches!(
            SqliteError::from_write("missing", err),
            SqliteError::DatabaseError(_)
        ));
    }
}
