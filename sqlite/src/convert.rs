//! Mapping of typed records onto table rows and chunked multi-row inserts.
//!
//! Each record type knows its table, its column list, and how it binds into
//! SQL values. [`insert_chunked`] writes a slice of records as a sequence of
//! `INSERT ... VALUES (...), (...)` statements of at most `chunk_size` rows
//! each, all on the caller's connection (and so inside the caller's
//! transaction).

use mlb_stats_core::{BatterStat, Game, PitcherStat, Player, Team};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::error::{Result, SqliteError};

/// Upper bound on bound parameters in one statement for the bundled SQLite.
pub(crate) const MAX_BOUND_PARAMS: usize = 32_766;

/// Default number of rows per insert statement.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// A record that maps onto one row of one table.
pub(crate) trait SqlRow {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    /// Trailing conflict clause, empty for insert-only tables.
    const ON_CONFLICT: &'static str = "";

    /// Appends this row's values in [`COLUMNS`](Self::COLUMNS) order.
    fn bind(&self, out: &mut Vec<Value>);
}

impl SqlRow for Team {
    const TABLE: &'static str = "teams";
    const COLUMNS: &'static [&'static str] = &["team_id", "name", "venue", "city"];
    // Teams are immutable once stored.
    const ON_CONFLICT: &'static str = "ON CONFLICT(team_id) DO NOTHING";

    fn bind(&self, out: &mut Vec<Value>) {
        out.push(Value::Integer(self.id));
        out.push(Value::Text(self.name.clone()));
        out.push(Value::Text(self.venue.clone()));
        out.push(Value::Text(self.city.clone()));
    }
}

impl SqlRow for Player {
    const TABLE: &'static str = "players";
    const COLUMNS: &'static [&'static str] = &["player_id", "name", "team_id", "position"];
    // An unresolved team never clears a known one.
    const ON_CONFLICT: &'static str = "ON CONFLICT(player_id) DO UPDATE SET \
         name = excluded.name, team_id = COALESCE(excluded.team_id, team_id), \
         position = excluded.position";

    fn bind(&self, out: &mut Vec<Value>) {
        out.push(Value::Integer(self.id));
        out.push(Value::Text(self.name.clone()));
        out.push(optional(self.team_id));
        out.push(Value::Text(self.position.clone()));
    }
}

impl SqlRow for Game {
    const TABLE: &'static str = "games";
    const COLUMNS: &'static [&'static str] = &[
        "game_id",
        "game_date",
        "location",
        "home_team_id",
        "away_team_id",
        "home_score",
        "away_score",
    ];

    fn bind(&self, out: &mut Vec<Value>) {
        out.push(Value::Integer(self.id));
        out.push(Value::Text(self.date.clone()));
        out.push(Value::Text(self.location.clone()));
        out.push(Value::Integer(self.home_team_id));
        out.push(Value::Integer(self.away_team_id));
        out.push(optional(self.home_score));
        out.push(optional(self.away_score));
    }
}

impl SqlRow for BatterStat {
    const TABLE: &'static str = "batter_stats";
    const COLUMNS: &'static [&'static str] = &[
        "game_id",
        "player_id",
        "at_bats",
        "runs",
        "hits",
        "doubles",
        "triples",
        "home_runs",
        "rbi",
        "walks",
        "hit_by_pitch",
        "strikeouts",
        "stolen_bases",
        "caught_stealing",
        "total_bases",
        "sac_flies",
        "avg",
        "obp",
        "slg",
        "ops",
    ];

    fn bind(&self, out: &mut Vec<Value>) {
        out.push(Value::Integer(self.game_id));
        out.push(Value::Integer(self.player_id));
        for count in [
            self.at_bats,
            self.runs,
            self.hits,
            self.doubles,
            self.triples,
            self.home_runs,
            self.rbi,
            self.walks,
            self.hit_by_pitch,
            self.strikeouts,
            self.stolen_bases,
            self.caught_stealing,
            self.total_bases,
            self.sac_flies,
        ] {
            out.push(Value::Integer(i64::from(count)));
        }
        out.push(Value::Real(self.avg()));
        out.push(Value::Real(self.obp()));
        out.push(Value::Real(self.slg()));
        out.push(Value::Real(self.ops()));
    }
}

impl SqlRow for PitcherStat {
    const TABLE: &'static str = "pitcher_stats";
    const COLUMNS: &'static [&'static str] = &[
        "game_id",
        "player_id",
        "innings_pitched",
        "hits_allowed",
        "runs_allowed",
        "earned_runs",
        "home_runs_allowed",
        "walks_allowed",
        "strikeouts",
    ];

    fn bind(&self, out: &mut Vec<Value>) {
        out.push(Value::Integer(self.game_id));
        out.push(Value::Integer(self.player_id));
        out.push(Value::Real(self.innings_pitched));
        for count in [
            self.hits_allowed,
            self.runs_allowed,
            self.earned_runs,
            self.home_runs_allowed,
            self.walks_allowed,
            self.strikeouts,
        ] {
            out.push(Value::Integer(i64::from(count)));
        }
    }
}

impl<R: SqlRow> SqlRow for &R {
    const TABLE: &'static str = R::TABLE;
    const COLUMNS: &'static [&'static str] = R::COLUMNS;
    const ON_CONFLICT: &'static str = R::ON_CONFLICT;

    fn bind(&self, out: &mut Vec<Value>) {
        (**self).bind(out);
    }
}

fn optional(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

/// Rows per statement after clamping to the bound-parameter limit.
pub(crate) fn effective_chunk_size(requested: usize, columns: usize) -> usize {
    let ceiling = MAX_BOUND_PARAMS / columns.max(1);
    requested.clamp(1, ceiling.max(1))
}

/// Builds `INSERT INTO table (cols) VALUES (?, ..), (?, ..) [conflict]`.
pub(crate) fn insert_sql(table: &str, columns: &[&str], rows: usize, on_conflict: &str) -> String {
    let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![tuple.as_str(); rows].join(", ");
    let mut sql = format!("INSERT INTO {table} ({}) VALUES {values}", columns.join(", "));
    if !on_conflict.is_empty() {
        sql.push(' ');
        sql.push_str(on_conflict);
    }
    sql
}

/// Outcome of one [`insert_chunked`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ChunkedWrite {
    /// Rows reported changed by SQLite (ignored conflicts excluded).
    pub rows: usize,
    /// Number of statements executed.
    pub statements: usize,
}

/// Writes `rows` in windows of at most `chunk_size` rows per statement.
///
/// Constraint violations are reported as [`SqliteError::DuplicateKey`] or
/// [`SqliteError::ForeignKey`] naming the prefixed table.
pub(crate) fn insert_chunked<R: SqlRow>(
    conn: &Connection,
    prefix: &str,
    rows: &[R],
    chunk_size: usize,
) -> Result<ChunkedWrite> {
    let mut written = ChunkedWrite::default();
    if rows.is_empty() {
        return Ok(written);
    }

    let table = format!("{prefix}{}", R::TABLE);
    let per_statement = effective_chunk_size(chunk_size, R::COLUMNS.len());
    let mut values = Vec::with_capacity(per_statement * R::COLUMNS.len());

    for chunk in rows.chunks(per_statement) {
        values.clear();
        for row in chunk {
            row.bind(&mut values);
        }
        let sql = insert_sql(&table, R::COLUMNS, chunk.len(), R::ON_CONFLICT);
        let mut stmt = conn.prepare_cached(&sql)?;
        written.rows += stmt
            .execute(params_from_iter(values.iter()))
            .map_err(|e| SqliteError::from_write(&table, e))?;
        written.statements += 1;
    }

    Ok(written)
}
