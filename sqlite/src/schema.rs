//! SQL schema generation with customizable table prefixes.
//!
//! Generates normalized `CREATE TABLE` and `CREATE INDEX` statements for the
//! statistics store. All table names are prefixed with a configurable string
//! so several isolated stores can share one SQLite database.
//!
//! # Table structure
//!
//! - `{prefix}schema_meta` — key/value schema metadata (`schema_version`)
//! - `{prefix}teams` — clubs keyed by API team id
//! - `{prefix}players` — players keyed by API player id, nullable team
//! - `{prefix}games` — games keyed by API game id
//! - `{prefix}batter_stats` — one batting line per (game, player)
//! - `{prefix}pitcher_stats` — one pitching line per (game, player)
//! - `{prefix}processed_files` — ledger of committed input files
//! - `{prefix}failed_files` — input files awaiting operator review
//!
//! Identifiers are the upstream API ids, so no table uses an
//! autoincrementing surrogate for its entity key.

use crate::error::{Result, SqliteError};

/// Version written to `schema_meta` by [`Migration::up`](crate::Migration::up).
pub const SCHEMA_VERSION: &str = "1";

/// Unprefixed table names in dependency order (parents first).
pub(crate) const TABLES: &[&str] = &[
    "schema_meta",
    "teams",
    "players",
    "games",
    "batter_stats",
    "pitcher_stats",
    "processed_files",
    "failed_files",
];

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the complete SQL schema for all tables with the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix contains characters
/// other than alphanumerics and underscores, or if it is empty.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {prefix}teams (
    team_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    venue TEXT NOT NULL,
    city TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS {prefix}players (
    player_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    team_id INTEGER,
    position TEXT NOT NULL,
    FOREIGN KEY (team_id) REFERENCES {prefix}teams(team_id)
);

CREATE TABLE IF NOT EXISTS {prefix}games (
    game_id INTEGER PRIMARY KEY,
    game_date TEXT NOT NULL,
    location TEXT NOT NULL,
    home_team_id INTEGER NOT NULL,
    away_team_id INTEGER NOT NULL,
    home_score INTEGER,
    away_score INTEGER,
    FOREIGN KEY (home_team_id) REFERENCES {prefix}teams(team_id),
    FOREIGN KEY (away_team_id) REFERENCES {prefix}teams(team_id)
);

CREATE TABLE IF NOT EXISTS {prefix}batter_stats (
    game_id INTEGER NOT NULL,
    player_id INTEGER NOT NULL,
    at_bats INTEGER NOT NULL DEFAULT 0,
    runs INTEGER NOT NULL DEFAULT 0,
    hits INTEGER NOT NULL DEFAULT 0,
    doubles INTEGER NOT NULL DEFAULT 0,
    triples INTEGER NOT NULL DEFAULT 0,
    home_runs INTEGER NOT NULL DEFAULT 0,
    rbi INTEGER NOT NULL DEFAULT 0,
    walks INTEGER NOT NULL DEFAULT 0,
    hit_by_pitch INTEGER NOT NULL DEFAULT 0,
    strikeouts INTEGER NOT NULL DEFAULT 0,
    stolen_bases INTEGER NOT NULL DEFAULT 0,
    caught_stealing INTEGER NOT NULL DEFAULT 0,
    total_bases INTEGER NOT NULL DEFAULT 0,
    sac_flies INTEGER NOT NULL DEFAULT 0,
    avg REAL NOT NULL DEFAULT 0.0,
    obp REAL NOT NULL DEFAULT 0.0,
    slg REAL NOT NULL DEFAULT 0.0,
    ops REAL NOT NULL DEFAULT 0.0,
    PRIMARY KEY (game_id, player_id),
    FOREIGN KEY (game_id) REFERENCES {prefix}games(game_id),
    FOREIGN KEY (player_id) REFERENCES {prefix}players(player_id)
);

CREATE TABLE IF NOT EXISTS {prefix}pitcher_stats (
    game_id INTEGER NOT NULL,
    player_id INTEGER NOT NULL,
    innings_pitched REAL NOT NULL DEFAULT 0.0,
    hits_allowed INTEGER NOT NULL DEFAULT 0,
    runs_allowed INTEGER NOT NULL DEFAULT 0,
    earned_runs INTEGER NOT NULL DEFAULT 0,
    home_runs_allowed INTEGER NOT NULL DEFAULT 0,
    walks_allowed INTEGER NOT NULL DEFAULT 0,
    strikeouts INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (game_id, player_id),
    FOREIGN KEY (game_id) REFERENCES {prefix}games(game_id),
    FOREIGN KEY (player_id) REFERENCES {prefix}players(player_id)
);

CREATE TABLE IF NOT EXISTS {prefix}processed_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_key TEXT NOT NULL UNIQUE,
    start_date TEXT,
    end_date TEXT,
    processed_at TEXT NOT NULL,
    checksum TEXT,
    teams INTEGER NOT NULL DEFAULT 0,
    players INTEGER NOT NULL DEFAULT 0,
    games INTEGER NOT NULL DEFAULT 0,
    batter_stats INTEGER NOT NULL DEFAULT 0,
    pitcher_stats INTEGER NOT NULL DEFAULT 0,
    dropped INTEGER NOT NULL DEFAULT 0,
    CHECK ((start_date IS NULL) = (end_date IS NULL))
);

CREATE TABLE IF NOT EXISTS {prefix}failed_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_key TEXT NOT NULL UNIQUE,
    failed_at TEXT NOT NULL,
    error_kind TEXT NOT NULL,
    message TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_{prefix}players_team ON {prefix}players(team_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}games_date ON {prefix}games(game_date);
CREATE INDEX IF NOT EXISTS idx_{prefix}batter_stats_player ON {prefix}batter_stats(player_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}batter_stats_home_runs ON {prefix}batter_stats(game_id) WHERE home_runs > 0;
CREATE INDEX IF NOT EXISTS idx_{prefix}pitcher_stats_player ON {prefix}pitcher_stats(player_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}processed_files_range ON {prefix}processed_files(start_date, end_date);
"#,
        prefix = prefix
    );

    Ok(sql)
}

/// Generates SQL to drop all tables in reverse dependency order.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql: String = TABLES
        .iter()
        .rev()
        .map(|table| format!("DROP TABLE IF EXISTS {prefix}{table};\n"))
        .collect();

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_valid_prefix() {
        assert!(validate_prefix("mlb_").is_ok());
        assert!(validate_prefix("test123").is_ok());
        assert!(validate_prefix("A_B_C").is_ok());
    }

    #[test]
    fn test_invalid_prefix_empty() {
        assert!(validate_prefix("").is_err());
    }

    #[test]
    fn test_invalid_prefix_special_chars() {
        assert!(validate_prefix("drop;--").is_err());
        assert!(validate_prefix("hello world").is_err());
        assert!(validate_prefix("test-prefix").is_err());
    }

    #[test]
    fn test_generate_schema_sql_contains_tables() {
        let sql = generate_schema_sql("mlb_").unwrap();
        for table in TABLES {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS mlb_{table} ")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn test_generate_drop_sql_reverses_dependency_order() {
        let sql = generate_drop_sql("mlb_").unwrap();
        let stats = sql.find("DROP TABLE IF EXISTS mlb_batter_stats").unwrap();
        let games = sql.find("DROP TABLE IF EXISTS mlb_games").unwrap();
        let teams = sql.find("DROP TABLE IF EXISTS mlb_teams").unwrap();
        assert!(stats < games && games < teams);
    }

    #[test]
    fn test_generate_drop_sql_invalid_prefix() {
        assert!(generate_drop_sql("").is_err());
    }

    #[test]
    fn test_stat_rows_unique_per_game_and_player() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        conn.execute_batch(
            "INSERT INTO t_teams VALUES (1, 'A', 'Park', 'City');
             INSERT INTO t_players VALUES (10, 'P', 1, 'RF');
             INSERT INTO t_games (game_id, game_date, location, home_team_id, away_team_id)
                 VALUES (100, '2024-04-01', 'Park', 1, 1);
             INSERT INTO t_batter_stats (game_id, player_id) VALUES (100, 10);",
        )
        .unwrap();

        assert!(
            conn.execute(
                "INSERT INTO t_batter_stats (game_id, player_id) VALUES (100, 10)",
                [],
            )
            .is_err()
        );
        // Unknown player is rejected at write time
        assert!(
            conn.execute(
                "INSERT INTO t_batter_stats (game_id, player_id) VALUES (100, 11)",
                [],
            )
            .is_err()
        );
    }

    #[test]
    fn test_processed_files_range_must_be_complete() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();

        assert!(
            conn.execute(
                "INSERT INTO t_processed_files (file_key, start_date, processed_at) VALUES ('a', '2024-04-01', 'now')",
                [],
            )
            .is_err()
        );
        assert!(
            conn.execute(
                "INSERT INTO t_processed_files (file_key, processed_at) VALUES ('b', 'now')",
                [],
            )
            .is_ok()
        );
    }
}
