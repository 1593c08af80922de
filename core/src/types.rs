//! Typed row records for the normalized statistics schema.
//!
//! Every record carries the identifiers reported by the upstream API. The
//! transform stage produces these from raw JSON, and the SQLite loader writes
//! them without further interpretation.

use serde::{Deserialize, Serialize};

/// Sentinel stored in text columns whose source field was absent.
pub const UNKNOWN: &str = "unknown";

/// A club, keyed by its API team id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub venue: String,
    pub city: String,
}

/// A rostered player. `team_id` is `None` for players whose club could not
/// be resolved (free agents, traded players listed under an unknown key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub team_id: Option<i64>,
    pub position: String,
}

/// A scheduled game with its final score, if reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    /// Date or timestamp as reported by the schedule (`2024-04-01T23:05:00Z`).
    pub date: String,
    pub location: String,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

/// One player's batting line for one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatterStat {
    pub game_id: i64,
    pub player_id: i64,
    pub at_bats: u32,
    pub runs: u32,
    pub hits: u32,
    pub doubles: u32,
    pub triples: u32,
    pub home_runs: u32,
    pub rbi: u32,
    pub walks: u32,
    pub hit_by_pitch: u32,
    pub strikeouts: u32,
    pub stolen_bases: u32,
    pub caught_stealing: u32,
    pub total_bases: u32,
    pub sac_flies: u32,
}

impl BatterStat {
    /// Batting average, hits over at-bats.
    pub fn avg(&self) -> f64 {
        ratio(self.hits.into(), self.at_bats.into())
    }

    /// On-base percentage.
    pub fn obp(&self) -> f64 {
        // Summed as u64 so counts near u32::MAX cannot overflow.
        let on_base = u64::from(self.hits) + u64::from(self.walks) + u64::from(self.hit_by_pitch);
        let chances = u64::from(self.at_bats)
            + u64::from(self.walks)
            + u64::from(self.hit_by_pitch)
            + u64::from(self.sac_flies);
        ratio(on_base, chances)
    }

    /// Slugging percentage, total bases over at-bats.
    pub fn slg(&self) -> f64 {
        ratio(self.total_bases.into(), self.at_bats.into())
    }

    /// On-base plus slugging.
    pub fn ops(&self) -> f64 {
        round3(self.obp() + self.slg())
    }
}

/// One pitcher's line for one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitcherStat {
    pub game_id: i64,
    pub player_id: i64,
    /// Innings in baseball notation: `6.1` is six and one third innings.
    pub innings_pitched: f64,
    pub hits_allowed: u32,
    pub runs_allowed: u32,
    pub earned_runs: u32,
    pub home_runs_allowed: u32,
    pub walks_allowed: u32,
    pub strikeouts: u32,
}

/// Entity kinds produced by the transform, used for issue reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Team,
    Player,
    Game,
    BatterStat,
    PitcherStat,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Team => "team",
            EntityKind::Player => "player",
            EntityKind::Game => "game",
            EntityKind::BatterStat => "batter_stat",
            EntityKind::PitcherStat => "pitcher_stat",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated record of any entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Team(Team),
    Player(Player),
    Game(Game),
    Batting(BatterStat),
    Pitching(PitcherStat),
}

/// All rows contributed by one input file, grouped by table.
///
/// Rows keep the order in which they appeared in the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub teams: Vec<Team>,
    pub players: Vec<Player>,
    pub games: Vec<Game>,
    pub batter_stats: Vec<BatterStat>,
    pub pitcher_stats: Vec<PitcherStat>,
}

impl Batch {
    pub fn push(&mut self, record: Record) {
        match record {
            Record::Team(team) => self.teams.push(team),
            Record::Player(player) => self.players.push(player),
            Record::Game(game) => self.games.push(game),
            Record::Batting(stat) => self.batter_stats.push(stat),
            Record::Pitching(stat) => self.pitcher_stats.push(stat),
        }
    }

    /// Total number of rows across all tables.
    pub fn len(&self) -> usize {
        self.teams.len()
            + self.players.len()
            + self.games.len()
            + self.batter_stats.len()
            + self.pitcher_stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<Record> for Batch {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round3(numerator as f64 / denominator as f64)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batting_rates() {
        let line = BatterStat {
            at_bats: 4,
            hits: 2,
            walks: 1,
            total_bases: 5,
            ..Default::default()
        };
        assert_eq!(line.avg(), 0.5);
        assert_eq!(line.obp(), 0.6);
        assert_eq!(line.slg(), 1.25);
        assert_eq!(line.ops(), 1.85);
    }

    #[test]
    fn test_batting_rates_zero_denominator() {
        let line = BatterStat::default();
        assert_eq!(line.avg(), 0.0);
        assert_eq!(line.obp(), 0.0);
        assert_eq!(line.slg(), 0.0);
        assert_eq!(line.ops(), 0.0);
    }

    #[test]
    fn test_batting_rates_with_extreme_counts() {
        let line = BatterStat {
            at_bats: u32::MAX,
            hits: u32::MAX,
            walks: 1,
            hit_by_pitch: u32::MAX,
            sac_flies: u32::MAX,
            total_bases: u32::MAX,
            ..Default::default()
        };
        assert_eq!(line.avg(), 1.0);
        assert_eq!(line.slg(), 1.0);
        assert!(line.obp() > 0.0 && line.obp() <= 1.0);
        assert!(line.ops().is_finite());
    }

    #[test]
    fn test_batch_push_routes_by_kind() {
        let mut batch = Batch::default();
        batch.extend([
            Record::Team(Team {
                id: 1,
                name: "A".into(),
                venue: UNKNOWN.into(),
                city: UNKNOWN.into(),
            }),
            Record::Batting(BatterStat {
                game_id: 1,
                player_id: 2,
                ..Default::default()
            }),
        ]);
        assert_eq!(batch.teams.len(), 1);
        assert_eq!(batch.batter_stats.len(), 1);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }
}
