//! Transactional, chunked loading of one file's rows.
//!
//! [`BatchLoader::load`] writes everything a file contributed inside a single
//! transaction and records the file in the ledger before committing:
//!
//! 1. teams (insert, existing rows untouched), then players (upsert),
//! 2. games, then batter and pitcher stats, in fixed-size chunks,
//! 3. the `processed_files` ledger row,
//! 4. commit.
//!
//! Any error before the commit drops the transaction, which rolls back every
//! row of the file, so a failed file can be retried without leaving partial
//! data behind.
//!
//! References are resolved against the store inside the transaction. A
//! player whose team is unknown is stored without a team; games and stat
//! rows whose referenced rows do not exist are dropped and counted rather
//! than failing the file.

use std::collections::{BTreeSet, HashSet};

use mlb_stats_core::{Batch, BatterStat, FileKey, Game, PitcherStat, Player};
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::convert::{DEFAULT_CHUNK_SIZE, insert_chunked};
use crate::error::Result;
use crate::ledger::{IngestionTracker, ProcessedCounts};
use crate::schema::validate_prefix;

/// Identity and provenance of the file being loaded.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub key: FileKey,
    /// Content checksum recorded in the ledger.
    pub checksum: Option<String>,
    /// Sub-records the transform already dropped from this file.
    pub dropped_records: usize,
}

impl SourceFile {
    pub fn new(key: FileKey) -> Self {
        Self {
            key,
            checksum: None,
            dropped_records: 0,
        }
    }
}

/// What one successful [`BatchLoader::load`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Newly inserted teams; teams already stored are not counted.
    pub teams: usize,
    /// Inserted or updated players.
    pub players: usize,
    pub games: usize,
    pub batter_stats: usize,
    pub pitcher_stats: usize,
    /// Players stored without a team because their team is unknown.
    pub detached_players: usize,
    /// Games dropped because a home or away team is unknown.
    pub orphaned_games: usize,
    /// Stat rows dropped because their game or player is unknown.
    pub orphaned_stats: usize,
    /// Insert statements executed.
    pub statements: usize,
}

impl LoadReport {
    fn ledger_counts(&self, transform_dropped: usize) -> ProcessedCounts {
        ProcessedCounts {
            teams: self.teams,
            players: self.players,
            games: self.games,
            batter_stats: self.batter_stats,
            pitcher_stats: self.pitcher_stats,
            dropped: transform_dropped + self.orphaned_games + self.orphaned_stats,
        }
    }
}

/// Writes transformed batches into the store.
pub struct BatchLoader<'a> {
    conn: &'a Connection,
    prefix: String,
    chunk_size: usize,
}

impl<'a> BatchLoader<'a> {
    /// Creates a loader with the default chunk size.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
    /// if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self {
            conn,
            prefix,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Sets the maximum number of rows per insert statement.
    ///
    /// Values are clamped to at least one row and to SQLite's bound
    /// parameter limit for the widest table.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Loads one file's batch and records it in the ledger atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DuplicateKey`](crate::SqliteError::DuplicateKey)
    /// if a game or stat row already exists (or appears twice in the batch),
    /// [`SqliteError::OverlappingRange`](crate::SqliteError::OverlappingRange)
    /// if the file's range overlaps a processed file, and
    /// [`SqliteError::DatabaseError`](crate::SqliteError::DatabaseError) for
    /// other failures. In every error case nothing from the file is
    /// committed.
    pub fn load(&self, batch: &Batch, source: &SourceFile) -> Result<LoadReport> {
        let tracker = IngestionTracker::new(self.conn, self.prefix.as_str())?;

        let tx = self.conn.unchecked_transaction()?;
        let report = self.write_rows(&tx, batch)?;
        tracker.mark_processed(
            &tx,
            &source.key,
            source.checksum.as_deref(),
            &report.ledger_counts(source.dropped_records),
        )?;
        tx.commit()?;

        info!(
            file_key = %source.key,
            games = report.games,
            batter_stats = report.batter_stats,
            pitcher_stats = report.pitcher_stats,
            statements = report.statements,
            "Committed file"
        );
        Ok(report)
    }

    fn write_rows(&self, conn: &Connection, batch: &Batch) -> Result<LoadReport> {
        let prefix = self.prefix.as_str();
        let mut report = LoadReport::default();

        let written = insert_chunked(conn, prefix, &batch.teams, self.chunk_size)?;
        report.teams = written.rows;
        report.statements += written.statements;

        let known_teams = self.existing_ids(
            conn,
            "teams",
            "team_id",
            batch.players.iter().filter_map(|p| p.team_id),
        )?;
        let players: Vec<Player> = batch
            .players
            .iter()
            .map(|player| match player.team_id {
                Some(team_id) if !known_teams.contains(&team_id) => {
                    report.detached_players += 1;
                    Player {
                        team_id: None,
                        ..player.clone()
                    }
                }
                _ => player.clone(),
            })
            .collect();
        let written = insert_chunked(conn, prefix, &players, self.chunk_size)?;
        report.players = written.rows;
        report.statements += written.statements;

        let known_teams = self.existing_ids(
            conn,
            "teams",
            "team_id",
            batch
                .games
                .iter()
                .flat_map(|g| [g.home_team_id, g.away_team_id]),
        )?;
        let games: Vec<&Game> = batch
            .games
            .iter()
            .filter(|g| {
                known_teams.contains(&g.home_team_id) && known_teams.contains(&g.away_team_id)
            })
            .collect();
        report.orphaned_games = batch.games.len() - games.len();
        let written = insert_chunked(conn, prefix, &games, self.chunk_size)?;
        report.games = written.rows;
        report.statements += written.statements;

        let stat_keys = batch
            .batter_stats
            .iter()
            .map(|s| (s.game_id, s.player_id))
            .chain(batch.pitcher_stats.iter().map(|s| (s.game_id, s.player_id)));
        let (game_ids, player_ids): (Vec<i64>, Vec<i64>) = stat_keys.unzip();
        let known_games = self.existing_ids(conn, "games", "game_id", game_ids)?;
        let known_players = self.existing_ids(conn, "players", "player_id", player_ids)?;
        let resolvable = |game_id: i64, player_id: i64| {
            known_games.contains(&game_id) && known_players.contains(&player_id)
        };

        let batting: Vec<&BatterStat> = batch
            .batter_stats
            .iter()
            .filter(|s| resolvable(s.game_id, s.player_id))
            .collect();
        let pitching: Vec<&PitcherStat> = batch
            .pitcher_stats
            .iter()
            .filter(|s| resolvable(s.game_id, s.player_id))
            .collect();
        report.orphaned_stats = batch.batter_stats.len() - batting.len()
            + (batch.pitcher_stats.len() - pitching.len());

        let written = insert_chunked(conn, prefix, &batting, self.chunk_size)?;
        report.batter_stats = written.rows;
        report.statements += written.statements;
        let written = insert_chunked(conn, prefix, &pitching, self.chunk_size)?;
        report.pitcher_stats = written.rows;
        report.statements += written.statements;

        if report.detached_players > 0 {
            warn!(count = report.detached_players, "Players stored without a known team");
        }
        if report.orphaned_games + report.orphaned_stats > 0 {
            warn!(
                games = report.orphaned_games,
                stats = report.orphaned_stats,
                "Dropped rows referencing unknown teams, games, or players"
            );
        }
        debug!(?report, "Rows written, pending commit");

        Ok(report)
    }

    /// Subset of `ids` present in `table.column`.
    fn existing_ids(
        &self,
        conn: &Connection,
        table: &str,
        column: &str,
        ids: impl IntoIterator<Item = i64>,
    ) -> Result<HashSet<i64>> {
        let distinct: BTreeSet<i64> = ids.into_iter().collect();
        let mut found = HashSet::with_capacity(distinct.len());
        if distinct.is_empty() {
            return Ok(found);
        }
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT 1 FROM {}{table} WHERE {column} = ?1",
            self.prefix
        ))?;
        for id in distinct {
            if stmt.exists(params![id])? {
                found.insert(id);
            }
        }
        Ok(found)
    }
}
