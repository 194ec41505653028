//! Local output specs: mirror, annotate side channel, stats snapshots.

use crate::prelude::*;

#[test]
fn stdout_mirrors_verbatim_input_by_default() {
    let ship = Ship::new();
    let assert = ship
        .logshipd()
        .write_stdin("alpha\nbeta\n")
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert_eq!(stdout, "alpha\nbeta\n");
}

#[test]
fn mirror_file_replaces_stdout() {
    let ship = Ship::new();
    let mirror = ship.path("mirror.log");

    let assert = ship
        .logshipd()
        .arg("--mirror-file")
        .arg(&mirror)
        .write_stdin("kept exactly\r\nas written")
        .assert()
        .success();

    assert_eq!(
        std::fs::read(&mirror).unwrap(),
        b"kept exactly\r\nas written"
    );
    assert!(assert.get_output().stdout.is_empty());
}

#[test]
fn annotate_file_gets_one_json_record_per_line() {
    let ship = Ship::new();
    let pid_file = ship.path("pid.map");
    std::fs::write(&pid_file, "running 9 1 indexer\n").unwrap();
    let annotate = ship.path("annotate.ndjson");

    ship.logshipd()
        .arg("--pid-file")
        .arg(&pid_file)
        .arg("--annotate-file")
        .arg(&annotate)
        .write_stdin("[9:x] first\nsecond\n")
        .assert()
        .success();

    let text = std::fs::read_to_string(&annotate).unwrap();
    let records: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["pid"], 9);
    assert_eq!(records[0]["process"], "indexer");
    assert_eq!(records[0]["line"], "[9:x] first");
    assert_eq!(records[1]["pid"], 0);
    assert_eq!(records[1]["process"], "unknown");
}

#[test]
fn final_stats_snapshot_lands_in_the_data_dir() {
    let ship = Ship::new();

    ship.logshipd()
        .write_stdin("one\ntwo\nthree\n")
        .assert()
        .success();

    let stats = std::fs::read_to_string(ship.path("logship.stats")).unwrap();
    assert!(stats.contains("logship_lines_ingested_total 3"));
    assert!(stats.contains("logship_queue_depth 0"));
    assert!(!ship.path("logship.stats.tmp").exists());
}

#[test]
fn stats_file_location_is_configurable() {
    let ship = Ship::new();
    let stats_path = ship.path("metrics.txt");

    ship.logshipd()
        .arg("--stats-file")
        .arg(&stats_path)
        .write_stdin("line\n")
        .assert()
        .success();

    assert!(std::fs::read_to_string(&stats_path)
        .unwrap()
        .contains("logship_lines_ingested_total 1"));
}
