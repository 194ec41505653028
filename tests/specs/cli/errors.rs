//! Startup and argument error specs
//!
//! Bad configuration must be reported synchronously with a non-zero
//! exit, before any line is consumed.

use crate::prelude::*;

#[test]
fn missing_data_dir_fails_before_reading_input() {
    bare_logshipd()
        .arg("--data-dir")
        .arg("/nonexistent/logship-scratch")
        .write_stdin("never consumed\n")
        .assert()
        .failure()
        .stderr_has("does not exist");
}

#[test]
fn garbage_stats_interval_is_rejected() {
    let ship = Ship::new();
    ship.logshipd()
        .arg("--stats-interval")
        .arg("soonish")
        .write_stdin("")
        .assert()
        .failure()
        .stderr_has("invalid duration");
}

#[test]
fn garbage_drain_max_wait_is_rejected() {
    let ship = Ship::new();
    bare_logshipd()
        .arg("--data-dir")
        .arg(ship.root())
        .arg("--drain-max-wait")
        .arg("whenever")
        .write_stdin("")
        .assert()
        .failure()
        .stderr_has("invalid duration");
}

#[test]
fn help_documents_the_flags() {
    bare_logshipd()
        .arg("--help")
        .assert()
        .success()
        .stdout_has("--push-url")
        .stdout_has("--mirror-file")
        .stdout_has("--wal-fsync");
}

#[test]
fn unknown_flag_fails() {
    bare_logshipd().arg("--frobnicate").assert().failure();
}
