//! Home-run co-occurrence ranking over the finished store.
//!
//! Two players co-occur when both hit at least one home run in the same
//! group, where a group is a calendar day ([`Grouping::Date`]) or a single
//! game ([`Grouping::Game`]). Each group credits every unordered pair of its
//! players once, so a doubleheader counts once per day under date grouping
//! and once per game under game grouping.
//!
//! # Example
//!
//! ```no_run
//! use mlb_stats_sqlite::{CooccurrenceQuery, QueryOptions};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("mlb.db").unwrap();
//! let query = CooccurrenceQuery::new(&conn, "mlb_").unwrap();
//!
//! for pair in query.top_pairs(&QueryOptions::default()).unwrap() {
//!     println!("{pair}");
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::schema::validate_prefix;

/// Number of pairs returned when no limit is configured.
pub const DEFAULT_TOP_N: usize = 10;

/// What counts as "the same occasion" for co-occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// One group per calendar day.
    #[default]
    Date,
    /// One group per game.
    Game,
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Date => f.write_str("date"),
            Grouping::Game => f.write_str("game"),
        }
    }
}

impl FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(Grouping::Date),
            "game" => Ok(Grouping::Game),
            other => Err(format!("unknown grouping '{other}', expected 'date' or 'game'")),
        }
    }
}

/// Options for [`CooccurrenceQuery::top_pairs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub top_n: usize,
    /// Player names whose pairs are left out of the ranking.
    pub excluded_players: Vec<String>,
    pub grouping: Grouping,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            excluded_players: Vec::new(),
            grouping: Grouping::Date,
        }
    }
}

impl QueryOptions {
    /// Returns a copy that also excludes `player`.
    pub fn excluding(&self, player: impl Into<String>) -> Self {
        let mut options = self.clone();
        options.excluded_players.push(player.into());
        options
    }
}

/// One batter-stat row with at least one home run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeRunRow {
    /// Calendar day of the game, `YYYY-MM-DD`.
    pub date: String,
    pub game_id: i64,
    pub player_id: i64,
    pub player_name: String,
}

/// A ranked pair; `first` sorts before `second` alphabetically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCount {
    pub first: String,
    pub second: String,
    pub count: usize,
}

impl fmt::Display for PairCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} - {} times", self.first, self.second, self.count)
    }
}

/// Read-only co-occurrence queries against a loaded store.
pub struct CooccurrenceQuery<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> CooccurrenceQuery<'a> {
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
    /// if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Every batter-stat row with a home run, joined to its game and player.
    pub fn home_run_rows(&self) -> Result<Vec<HomeRunRow>> {
        let p = &self.prefix;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT COALESCE(date(g.game_date), substr(g.game_date, 1, 10)), \
                    g.game_id, pl.player_id, pl.name \
             FROM {p}batter_stats b \
             JOIN {p}games g ON g.game_id = b.game_id \
             JOIN {p}players pl ON pl.player_id = b.player_id \
             WHERE b.home_runs > 0 \
             ORDER BY 1, g.game_id, pl.player_id"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(HomeRunRow {
                    date: row.get(0)?,
                    game_id: row.get(1)?,
                    player_id: row.get(2)?,
                    player_name: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Ranks player pairs by how often both homered in the same group.
    pub fn top_pairs(&self, options: &QueryOptions) -> Result<Vec<PairCount>> {
        let rows = self.home_run_rows()?;
        debug!(rows = rows.len(), grouping = %options.grouping, "Ranking home-run pairs");
        Ok(rank_pairs(&rows, options))
    }
}

/// Counts and ranks co-occurring pairs from home-run rows.
///
/// Ties on count are broken by the two names concatenated in alphabetical
/// order, then by player ids.
pub fn rank_pairs(rows: &[HomeRunRow], options: &QueryOptions) -> Vec<PairCount> {
    // group -> player id -> name; the map also dedups repeat rows in a group
    let mut groups: BTreeMap<(&str, i64), BTreeMap<i64, &str>> = BTreeMap::new();
    for row in rows {
        if options.excluded_players.contains(&row.player_name) {
            continue;
        }
        let game = match options.grouping {
            Grouping::Date => 0,
            Grouping::Game => row.game_id,
        };
        groups
            .entry((row.date.as_str(), game))
            .or_default()
            .insert(row.player_id, row.player_name.as_str());
    }

    let mut counts: HashMap<((&str, i64), (&str, i64)), usize> = HashMap::new();
    for players in groups.values() {
        let mut members: Vec<(&str, i64)> = players.iter().map(|(id, name)| (*name, *id)).collect();
        members.sort_unstable();
        for (i, first) in members.iter().enumerate() {
            for second in &members[i + 1..] {
                *counts.entry((*first, *second)).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(a, a_count), (b, b_count)| {
        b_count
            .cmp(a_count)
            .then_with(|| concat(a).cmp(&concat(b)))
            .then_with(|| (a.0.1, a.1.1).cmp(&(b.0.1, b.1.1)))
    });

    ranked
        .into_iter()
        .take(options.top_n)
        .map(|((first, second), count)| PairCount {
            first: first.0.to_string(),
            second: second.0.to_string(),
            count,
        })
        .collect()
}

fn concat(pair: &((&str, i64), (&str, i64))) -> String {
    format!("{}{}", pair.0.0, pair.1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hr(date: &str, game_id: i64, player_id: i64, name: &str) -> HomeRunRow {
        HomeRunRow {
            date: date.into(),
            game_id,
            player_id,
            player_name: name.into(),
        }
    }

    fn fixture() -> Vec<HomeRunRow> {
        vec![
            hr("2024-04-01", 1, 1, "A"),
            hr("2024-04-01", 1, 2, "B"),
            hr("2024-04-01", 2, 3, "C"),
            hr("2024-04-02", 3, 1, "A"),
            hr("2024-04-02", 3, 2, "B"),
        ]
    }

    fn rendered(pairs: &[PairCount]) -> Vec<String> {
        pairs.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_rank_by_count_then_names() {
        let pairs = rank_pairs(&fixture(), &QueryOptions::default());
        assert_eq!(
            rendered(&pairs),
            ["A / B - 2 times", "A / C - 1 times", "B / C - 1 times"]
        );
    }

    #[test]
    fn test_excluded_player_removes_pairs() {
        let options = QueryOptions::default().excluding("A");
        let pairs = rank_pairs(&fixture(), &options);
        assert_eq!(rendered(&pairs), ["B / C - 1 times"]);
    }

    #[test]
    fn test_doubleheader_counts_once_per_date() {
        let rows = vec![
            hr("2024-06-01", 10, 1, "A"),
            hr("2024-06-01", 10, 2, "B"),
            hr("2024-06-01", 11, 1, "A"),
            hr("2024-06-01", 11, 2, "B"),
        ];
        let by_date = rank_pairs(&rows, &QueryOptions::default());
        assert_eq!(by_date[0].count, 1);

        let by_game = QueryOptions {
            grouping: Grouping::Game,
            ..Default::default()
        };
        assert_eq!(rank_pairs(&rows, &by_game)[0].count, 2);
    }

    #[test]
    fn test_game_grouping_splits_same_day_games() {
        let options = QueryOptions {
            grouping: Grouping::Game,
            ..Default::default()
        };
        // C homered in a different game on 2024-04-01
        let pairs = rank_pairs(&fixture(), &options);
        assert_eq!(rendered(&pairs), ["A / B - 2 times"]);
    }

    #[test]
    fn test_pair_names_are_alphabetical() {
        let rows = vec![hr("2024-04-01", 1, 1, "Zeta"), hr("2024-04-01", 1, 2, "Alpha")];
        let pairs = rank_pairs(&rows, &QueryOptions::default());
        assert_eq!(pairs[0].first, "Alpha");
        assert_eq!(pairs[0].second, "Zeta");
    }

    #[test]
    fn test_top_n_truncates() {
        let options = QueryOptions {
            top_n: 1,
            ..Default::default()
        };
        assert_eq!(rank_pairs(&fixture(), &options).len(), 1);
    }

    #[test]
    fn test_single_player_days_produce_no_pairs() {
        let rows = vec![hr("2024-04-01", 1, 1, "A"), hr("2024-04-02", 2, 2, "B")];
        assert!(rank_pairs(&rows, &QueryOptions::default()).is_empty());
    }

    #[test]
    fn test_grouping_parses_case_insensitively() {
        assert_eq!("Game".parse::<Grouping>().unwrap(), Grouping::Game);
        assert_eq!("date".parse::<Grouping>().unwrap(), Grouping::Date);
        assert!("week".parse::<Grouping>().is_err());
    }
}
