//! Conversion of raw extractor documents into typed rows.
//!
//! The extractor writes one JSON object per file with the sections `teams`,
//! `rosters`, `games`, `batter_stats` and `pitcher_stats` (plus a `schedule`
//! section that is ignored here). Field shapes follow the MLB stats API and
//! are not guaranteed, so every field is read defensively:
//!
//! - Identifiers (team, player, game) are mandatory for the records that
//!   carry them. A sub-record without one is dropped and reported as a
//!   [`RecordIssue`]; the rest of the document is still transformed.
//! - Optional text falls back to [`UNKNOWN`], optional counts to `0`.
//! - A document that is not a JSON object, or whose sections have the wrong
//!   JSON type, is rejected as a whole with [`TransformError::Malformed`].
//!
//! The transform performs no I/O.
//!
//! # Example
//!
//! ```
//! use mlb_stats_core::transform;
//! use serde_json::json;
//!
//! let doc = json!({
//!     "teams": [{"id": 147, "name": "New York Yankees"}],
//!     "batter_stats": [
//!         {"game_id": 1, "player_id": 592450, "home_runs": 1},
//!         {"game_id": 1, "home_runs": 2}
//!     ]
//! });
//! let output = transform(&doc).unwrap();
//! assert_eq!(output.batch.teams[0].venue, "unknown");
//! assert_eq!(output.batch.batter_stats.len(), 1);
//! assert_eq!(output.dropped().batter_stats, 1);
//! ```

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::{Result, TransformError};
use crate::types::{
    Batch, BatterStat, EntityKind, Game, PitcherStat, Player, Record, Team, UNKNOWN,
};

/// Problem found in one sub-record of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssue {
    pub kind: EntityKind,
    /// Where the record sits in the document, e.g. `batter_stats[3]`.
    pub location: String,
    pub reason: String,
    /// Whether the record was dropped or kept with a degraded field.
    pub dropped: bool,
}

impl std::fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = if self.dropped { "dropped" } else { "kept" };
        write!(f, "{} {} ({action}): {}", self.kind, self.location, self.reason)
    }
}

/// Number of dropped sub-records per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedCounts {
    pub teams: usize,
    pub players: usize,
    pub games: usize,
    pub batter_stats: usize,
    pub pitcher_stats: usize,
}

impl DroppedCounts {
    pub fn total(&self) -> usize {
        self.teams + self.players + self.games + self.batter_stats + self.pitcher_stats
    }

    fn bump(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Team => self.teams += 1,
            EntityKind::Player => self.players += 1,
            EntityKind::Game => self.games += 1,
            EntityKind::BatterStat => self.batter_stats += 1,
            EntityKind::PitcherStat => self.pitcher_stats += 1,
        }
    }
}

/// Result of transforming one document.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub batch: Batch,
    pub issues: Vec<RecordIssue>,
}

impl TransformOutput {
    pub fn dropped(&self) -> DroppedCounts {
        let mut counts = DroppedCounts::default();
        for issue in self.issues.iter().filter(|i| i.dropped) {
            counts.bump(issue.kind);
        }
        counts
    }
}

/// Parses and transforms a raw document.
///
/// # Errors
///
/// Returns [`TransformError::Json`] if the bytes are not JSON, and
/// [`TransformError::Malformed`] as described for [`transform`].
pub fn transform_slice(bytes: &[u8]) -> Result<TransformOutput> {
    let doc: Value = serde_json::from_slice(bytes)?;
    transform(&doc)
}

/// Transforms one parsed document into typed rows.
///
/// # Errors
///
/// Returns [`TransformError::Malformed`] if the document is not an object or
/// if one of its sections has the wrong JSON type.
pub fn transform(doc: &Value) -> Result<TransformOutput> {
    let root = doc
        .as_object()
        .ok_or_else(|| TransformError::Malformed("document is not a JSON object".into()))?;

    let mut cx = Context::default();

    for (index, raw) in section_array(root, "teams")?.iter().enumerate() {
        let location = format!("teams[{index}]");
        if let Some(team) = cx.team(raw, &location) {
            cx.teams_by_name.insert(team.name.clone(), team.id);
            cx.emit(Record::Team(team));
        }
    }

    if let Some(rosters) = section_object(root, "rosters")? {
        for (team_key, roster) in rosters {
            let team_id = cx.resolve_roster_team(team_key);
            let Some(entries) = roster.as_array() else {
                cx.issue(
                    EntityKind::Player,
                    format!("rosters[{team_key:?}]"),
                    "roster is not an array",
                    true,
                );
                continue;
            };
            for (index, raw) in entries.iter().enumerate() {
                let location = format!("rosters[{team_key:?}][{index}]");
                if let Some(player) = cx.player(raw, team_id, &location) {
                    cx.emit(Record::Player(player));
                }
            }
        }
    }

    for (index, raw) in section_array(root, "games")?.iter().enumerate() {
        let location = format!("games[{index}]");
        if let Some(game) = cx.game(raw, &location) {
            cx.emit(Record::Game(game));
        }
    }

    for (index, raw) in section_array(root, "batter_stats")?.iter().enumerate() {
        let location = format!("batter_stats[{index}]");
        if let Some(stat) = cx.batting(raw, &location) {
            cx.emit(Record::Batting(stat));
        }
    }

    for (index, raw) in section_array(root, "pitcher_stats")?.iter().enumerate() {
        let location = format!("pitcher_stats[{index}]");
        if let Some(stat) = cx.pitching(raw, &location) {
            cx.emit(Record::Pitching(stat));
        }
    }

    Ok(TransformOutput {
        batch: cx.batch,
        issues: cx.issues,
    })
}

#[derive(Default)]
struct Context {
    batch: Batch,
    issues: Vec<RecordIssue>,
    teams_by_name: HashMap<String, i64>,
}

impl Context {
    fn emit(&mut self, record: Record) {
        self.batch.push(record);
    }

    fn issue(&mut self, kind: EntityKind, location: String, reason: &str, dropped: bool) {
        self.issues.push(RecordIssue {
            kind,
            location,
            reason: reason.to_string(),
            dropped,
        });
    }

    /// Resolves a roster key to a team id: all-digit keys are API ids, any
    /// other key is looked up by team name among this document's teams.
    fn resolve_roster_team(&mut self, key: &str) -> Option<i64> {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = key.parse() {
                return Some(id);
            }
        }
        let resolved = self.teams_by_name.get(key).copied();
        if resolved.is_none() {
            self.issue(
                EntityKind::Player,
                format!("rosters[{key:?}]"),
                "roster team not found; players stored without a team",
                false,
            );
        }
        resolved
    }

    fn team(&mut self, raw: &Value, location: &str) -> Option<Team> {
        let Some(id) = id_at(raw, &["id"]) else {
            self.issue(EntityKind::Team, location.into(), "missing team id", true);
            return None;
        };
        Some(Team {
            id,
            name: text_at(raw, &["name"]).unwrap_or_else(unknown),
            venue: text_at(raw, &["venue", "name"]).unwrap_or_else(unknown),
            city: text_at(raw, &["locationName"]).unwrap_or_else(unknown),
        })
    }

    fn player(&mut self, raw: &Value, team_id: Option<i64>, location: &str) -> Option<Player> {
        let Some(id) = id_at(raw, &["person", "id"]) else {
            self.issue(EntityKind::Player, location.into(), "missing player id", true);
            return None;
        };
        Some(Player {
            id,
            name: text_at(raw, &["person", "fullName"]).unwrap_or_else(unknown),
            team_id,
            position: text_at(raw, &["position", "abbreviation"]).unwrap_or_else(unknown),
        })
    }

    fn game(&mut self, raw: &Value, location: &str) -> Option<Game> {
        let Some(id) = id_at(raw, &["game_id"]) else {
            self.issue(EntityKind::Game, location.into(), "missing game id", true);
            return None;
        };
        let (Some(home_team_id), Some(away_team_id)) =
            (id_at(raw, &["home_team_id"]), id_at(raw, &["away_team_id"]))
        else {
            self.issue(EntityKind::Game, location.into(), "missing home or away team id", true);
            return None;
        };
        let Some(date) = text_at(raw, &["game_date"]).filter(|d| is_calendar_date(d)) else {
            self.issue(EntityKind::Game, location.into(), "missing or invalid game date", true);
            return None;
        };
        Some(Game {
            id,
            date,
            location: text_at(raw, &["location"]).unwrap_or_else(unknown),
            home_team_id,
            away_team_id,
            home_score: id_at(raw, &["home_team_score"]),
            away_score: id_at(raw, &["away_team_score"]),
        })
    }

    fn stat_keys(&mut self, raw: &Value, kind: EntityKind, location: &str) -> Option<(i64, i64)> {
        match (id_at(raw, &["game_id"]), id_at(raw, &["player_id"])) {
            (Some(game_id), Some(player_id)) => Some((game_id, player_id)),
            (None, _) => {
                self.issue(kind, location.into(), "missing game id", true);
                None
            }
            (_, None) => {
                self.issue(kind, location.into(), "missing player id", true);
                None
            }
        }
    }

    fn batting(&mut self, raw: &Value, location: &str) -> Option<BatterStat> {
        let (game_id, player_id) = self.stat_keys(raw, EntityKind::BatterStat, location)?;
        Some(BatterStat {
            game_id,
            player_id,
            at_bats: count_at(raw, "at_bats"),
            runs: count_at(raw, "runs"),
            hits: count_at(raw, "hits"),
            doubles: count_at(raw, "doubles"),
            triples: count_at(raw, "triples"),
            home_runs: count_at(raw, "home_runs"),
            rbi: count_at(raw, "rbi"),
            walks: count_at(raw, "walks"),
            hit_by_pitch: count_at(raw, "hit_by_pitch"),
            strikeouts: count_at(raw, "strikeouts"),
            stolen_bases: count_at(raw, "stolen_bases"),
            caught_stealing: count_at(raw, "caught_stealing"),
            total_bases: count_at(raw, "total_bases"),
            sac_flies: count_at(raw, "sac_flies"),
        })
    }

    fn pitching(&mut self, raw: &Value, location: &str) -> Option<PitcherStat> {
        let (game_id, player_id) = self.stat_keys(raw, EntityKind::PitcherStat, location)?;
        Some(PitcherStat {
            game_id,
            player_id,
            innings_pitched: innings_at(raw, "innings_pitched"),
            hits_allowed: count_at(raw, "hits_allowed"),
            runs_allowed: count_at(raw, "runs_allowed"),
            earned_runs: count_at(raw, "earned_runs"),
            home_runs_allowed: count_at(raw, "home_runs_allowed"),
            walks_allowed: count_at(raw, "walks_allowed"),
            strikeouts: count_at(raw, "strikeouts"),
        })
    }
}

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Missing and `null` sections are empty; any other non-array is malformed.
fn section_array<'a>(root: &'a Map<String, Value>, name: &str) -> Result<&'a [Value]> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(TransformError::Malformed(format!(
            "section '{name}' is not an array"
        ))),
    }
}

fn section_object<'a>(
    root: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>> {
    match root.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(TransformError::Malformed(format!(
            "section '{name}' is not an object"
        ))),
    }
}

fn lookup<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(raw, |value, key| value.get(*key))
}

/// Integer identifiers may arrive as JSON numbers or numeric strings.
fn id_at(raw: &Value, path: &[&str]) -> Option<i64> {
    match lookup(raw, path)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text_at(raw: &Value, path: &[&str]) -> Option<String> {
    match lookup(raw, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn count_at(raw: &Value, key: &str) -> u32 {
    id_at(raw, &[key])
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn innings_at(raw: &Value, key: &str) -> f64 {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn is_calendar_date(value: &str) -> bool {
    value
        .get(..10)
        .is_some_and(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_document() -> Value {
        json!({
            "teams": [
                {"id": 147, "name": "New York Yankees", "venue": {"name": "Yankee Stadium"}, "locationName": "Bronx"},
                {"id": 111, "name": "Boston Red Sox", "venue": {"name": "Fenway Park"}, "locationName": "Boston"}
            ],
            "rosters": {
                "New York Yankees": [
                    {"person": {"id": 592450, "fullName": "Aaron Judge"}, "position": {"abbreviation": "RF"}},
                    {"person": {"id": 665742, "fullName": "Juan Soto"}}
                ],
                "111": [
                    {"person": {"id": 646240, "fullName": "Rafael Devers"}, "position": {"abbreviation": "3B"}}
                ]
            },
            "schedule": {"dates": []},
            "games": [
                {"game_id": 745001, "game_date": "2024-04-01T23:05:00Z", "location": "Yankee Stadium",
                 "home_team_id": 147, "away_team_id": 111, "home_team_score": 5, "away_team_score": 3}
            ],
            "batter_stats": [
                {"game_id": 745001, "player_id": 592450, "at_bats": 4, "hits": 2, "home_runs": 1, "total_bases": 5},
                {"game_id": 745001, "player_id": 646240, "at_bats": 3, "hits": 1}
            ],
            "pitcher_stats": [
                {"game_id": 745001, "player_id": 543037, "innings_pitched": "6.1", "strikeouts": 7}
            ]
        })
    }

    #[test]
    fn test_transform_full_document() {
        let output = transform(&sample_document()).unwrap();
        let batch = &output.batch;

        assert_eq!(batch.teams.len(), 2);
        assert_eq!(batch.teams[0].venue, "Yankee Stadium");
        assert_eq!(batch.teams[1].city, "Boston");

        assert_eq!(batch.players.len(), 3);
        let soto = batch.players.iter().find(|p| p.id == 665742).unwrap();
        assert_eq!(soto.team_id, Some(147));
        assert_eq!(soto.position, UNKNOWN);
        let devers = batch.players.iter().find(|p| p.id == 646240).unwrap();
        assert_eq!(devers.team_id, Some(111));

        assert_eq!(batch.games.len(), 1);
        assert_eq!(batch.games[0].home_score, Some(5));
        assert_eq!(batch.batter_stats.len(), 2);
        assert_eq!(batch.batter_stats[0].home_runs, 1);
        assert_eq!(batch.pitcher_stats[0].innings_pitched, 6.1);
        assert!(output.issues.is_empty());
    }

    #[test]
    fn test_stat_missing_player_id_is_dropped_and_counted() {
        let mut doc = sample_document();
        doc["batter_stats"]
            .as_array_mut()
            .unwrap()
            .push(json!({"game_id": 745001, "home_runs": 1}));
        doc["pitcher_stats"]
            .as_array_mut()
            .unwrap()
            .push(json!({"player_id": 1}));

        let output = transform(&doc).unwrap();
        assert_eq!(output.batch.batter_stats.len(), 2);
        assert_eq!(output.batch.pitcher_stats.len(), 1);

        let dropped = output.dropped();
        assert_eq!(dropped.batter_stats, 1);
        assert_eq!(dropped.pitcher_stats, 1);
        assert_eq!(dropped.total(), 2);
        assert_eq!(output.issues[0].location, "batter_stats[2]");
        assert_eq!(output.issues[0].reason, "missing player id");
    }

    #[test]
    fn test_roster_with_unknown_team_name_keeps_players_without_team() {
        let doc = json!({
            "teams": [],
            "rosters": {"Expos": [{"person": {"id": 1, "fullName": "Old Timer"}}]}
        });
        let output = transform(&doc).unwrap();
        assert_eq!(output.batch.players[0].team_id, None);
        assert_eq!(output.issues.len(), 1);
        assert!(!output.issues[0].dropped);
        assert_eq!(output.dropped().total(), 0);
    }

    #[test]
    fn test_game_without_date_or_teams_is_dropped() {
        let doc = json!({
            "games": [
                {"game_id": 1, "home_team_id": 1, "away_team_id": 2},
                {"game_id": 2, "game_date": "2024-04-01", "home_team_id": 1},
                {"game_id": 3, "game_date": "April 1st", "home_team_id": 1, "away_team_id": 2},
                {"game_id": "4", "game_date": "2024-04-01", "home_team_id": "1", "away_team_id": 2}
            ]
        });
        let output = transform(&doc).unwrap();
        assert_eq!(output.batch.games.len(), 1);
        assert_eq!(output.batch.games[0].id, 4);
        assert_eq!(output.batch.games[0].location, UNKNOWN);
        assert_eq!(output.dropped().games, 3);
    }

    #[test]
    fn test_non_object_document_is_malformed() {
        assert!(matches!(
            transform(&json!([1, 2, 3])),
            Err(TransformError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrong_section_type_is_malformed() {
        assert!(matches!(
            transform(&json!({"batter_stats": {"oops": true}})),
            Err(TransformError::Malformed(_))
        ));
        assert!(matches!(
            transform(&json!({"rosters": []})),
            Err(TransformError::Malformed(_))
        ));
    }

    #[test]
    fn test_transform_slice_reports_invalid_json() {
        assert!(matches!(
            transform_slice(b"{not json"),
            Err(TransformError::Json(_))
        ));
    }

    #[test]
    fn test_missing_counts_default_to_zero() {
        let doc = json!({
            "batter_stats": [{"game_id": 1, "player_id": 2, "hits": -3, "runs": "2"}]
        });
        let stat = &transform(&doc).unwrap().batch.batter_stats[0];
        assert_eq!(stat.hits, 0);
        assert_eq!(stat.runs, 2);
        assert_eq!(stat.home_runs, 0);
    }

    #[test]
    fn test_empty_document_yields_empty_batch() {
        let output = transform(&json!({})).unwrap();
        assert!(output.batch.is_empty());
        assert!(output.issues.is_empty());
    }
}
