use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use serde_json::json;
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_mlb-stats");

/// Writes a config pointing every path into `dir`.
fn write_config(dir: &Path) -> PathBuf {
    let yaml = format!(
        "database: {db}\npending_dir: {raw}\ndone_dir: {done}\nchunk_size: 2\n",
        db = dir.join("mlb.db").display(),
        raw = dir.join("raw").display(),
        done = dir.join("historical").display(),
    );
    let path = dir.join("mlb-stats.yml");
    fs::write(&path, yaml).expect("failed to write config");
    path
}

/// One extractor file with a single game on `date` where `hitters` homered.
fn write_day(dir: &Path, game_id: i64, date: &str, hitters: &[i64]) {
    let players = [(1, "Aaron Judge"), (2, "Juan Soto"), (3, "Rafael Devers")];
    let batting: Vec<_> = players
        .iter()
        .map(|(id, _)| {
            json!({
                "game_id": game_id,
                "player_id": id,
                "at_bats": 4,
                "home_runs": i64::from(hitters.contains(id)),
            })
        })
        .collect();
    let roster: Vec<_> = players
        .iter()
        .map(|(id, name)| json!({"person": {"id": id, "fullName": name}, "position": {"abbreviation": "OF"}}))
        .collect();
    let doc = json!({
        "teams": [
            {"id": 147, "name": "New York Yankees", "venue": {"name": "Yankee Stadium"}, "locationName": "Bronx"},
            {"id": 111, "name": "Boston Red Sox", "venue": {"name": "Fenway Park"}, "locationName": "Boston"}
        ],
        "rosters": {"147": roster},
        "games": [{
            "game_id": game_id,
            "game_date": date,
            "home_team_id": 147,
            "away_team_id": 111
        }],
        "batter_stats": batting,
        "pitcher_stats": []
    });
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    let name = format!("mlb_raw_{date}_{date}_20240501_000000.json");
    fs::write(raw.join(name), doc.to_string()).unwrap();
}

fn run(args: &[&str]) -> Output {
    std::process::Command::new(BIN)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run mlb-stats")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn loaded_workspace() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    write_day(dir.path(), 1, "2024-04-01", &[1, 2, 3]);
    write_day(dir.path(), 2, "2024-04-02", &[1, 2]);
    let out = run(&["load", "--config", config.to_str().unwrap()]);
    assert!(out.status.success(), "load should succeed: {out:?}");
    (dir, config)
}

#[test]
fn load_reports_summary_and_archives() {
    let (dir, config) = loaded_workspace();
    assert!(dir.path().join("historical").read_dir().unwrap().count() == 2);

    let out = run(&["load", "--config", config.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Files processed: 0"));
}

#[test]
fn query_prints_both_rankings() {
    let (_dir, config) = loaded_workspace();
    let out = run(&["query", "--config", config.to_str().unwrap()]);
    assert!(out.status.success());

    let text = stdout(&out);
    let (all, restricted) = text
        .split_once("excluding Aaron Judge")
        .expect("second ranking should be printed");
    assert!(all.contains("1. Aaron Judge / Juan Soto - 2 times"));
    assert!(all.contains("2. Aaron Judge / Rafael Devers - 1 times"));
    assert!(all.contains("3. Juan Soto / Rafael Devers - 1 times"));
    assert!(restricted.contains("1. Juan Soto / Rafael Devers - 1 times"));
    assert!(!restricted.contains("Aaron Judge /"));
}

#[test]
fn query_flags_override_config() {
    let (_dir, config) = loaded_workspace();
    let out = run(&[
        "query",
        "--config",
        config.to_str().unwrap(),
        "--exclude",
        "Juan Soto",
        "--top",
        "1",
        "--group-by",
        "game",
    ]);
    assert!(out.status.success());

    let text = stdout(&out);
    assert!(text.contains("Top 1 home-run pairs by game"));
    let (_, restricted) = text.split_once("excluding Juan Soto").unwrap();
    assert!(restricted.contains("1. Aaron Judge / Rafael Devers - 1 times"));
}

#[test]
fn status_lists_processed_files() {
    let (_dir, config) = loaded_workspace();
    let out = run(&["status", "--config", config.to_str().unwrap()]);
    assert!(out.status.success());

    let text = stdout(&out);
    assert!(text.contains("Games: 2"));
    assert!(text.contains("Processed files: 2"));
    assert!(text.contains("mlb_raw_2024-04-01_2024-04-01_20240501_000000.json"));
    assert!(text.contains("Failed files: 0"));
}

#[test]
fn clear_failure_retries_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    let name = "mlb_raw_2024-04-01_2024-04-01_20240501_000000.json";
    fs::write(raw.join(name), "not json").unwrap();

    let out = run(&["load", "--config", config.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Files failed: 1"));

    let out = run(&["status", "--config", config.to_str().unwrap()]);
    assert!(stdout(&out).contains("[MalformedInputError]"));

    let out = run(&["clear-failure", "--config", config.to_str().unwrap(), name]);
    assert!(out.status.success());

    let out = run(&["clear-failure", "--config", config.to_str().unwrap(), name]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error: "));
}

#[test]
fn query_without_database_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("missing.db");
    let out = run(&["query", "--db", db.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("does not exist"));
    assert!(!db.exists());
}

#[test]
fn invalid_group_by_is_rejected() {
    let out = run(&["query", "--group-by", "week"]);
    assert!(!out.status.success());
}
