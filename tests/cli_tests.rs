//! Command-line surface tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn splicer() -> Command {
    let mut cmd = Command::cargo_bin("splicer").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("SPLICER_LOG_LEVEL")
        .env_remove("SPLICER_LOG_FORMAT")
        .env_remove("SPLICER_CACHE_DIR");
    cmd
}

#[test]
fn test_help_lists_commands() {
    splicer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cut"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("silence"));
}

#[test]
fn test_cut_rejects_bad_time() {
    splicer()
        .args(["cut", "--input", "in.mp4", "--start", "abc", "--end", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid time format"));
}

#[test]
fn test_cut_rejects_reversed_range() {
    splicer()
        .args(["cut", "--input", "in.mp4", "--start", "00:10", "--end", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Start time must be before end time"));
}

#[test]
fn test_keyframes_start_requires_end() {
    splicer()
        .args(["keyframes", "--input", "in.mp4", "--start", "1"])
        .assert()
        .failure();
}

#[test]
fn test_unknown_log_format_rejected() {
    splicer()
        .args(["--log-format", "xml", "session", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log format"));
}

#[test]
fn test_session_lifecycle_without_media() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().to_str().unwrap();

    splicer()
        .args(["--cache-dir", cache_dir, "session", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved session"));

    splicer()
        .args(["--cache-dir", cache_dir, "session", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Session cleared"));
    assert!(dir.path().join("session.json").exists());

    splicer()
        .args(["--cache-dir", cache_dir, "session", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    splicer()
        .args(["--cache-dir", cache_dir, "session", "export", "--output", "out.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved clips"));
}

#[test]
fn test_session_export_modes() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().to_str().unwrap();

    splicer()
        .args(["--cache-dir", cache_dir, "session", "export", "--separate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No saved clips"));

    splicer()
        .args([
            "--cache-dir",
            cache_dir,
            "session",
            "export",
            "--separate",
            "--output",
            "out.mp4",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
