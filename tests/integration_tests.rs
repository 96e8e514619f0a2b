//! Integration tests for the shardrun CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Command isolated from user and repository config files
fn shardrun(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shardrun").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .env_remove("SHARDRUN_PARALLEL__MAX_WORKERS");
    cmd
}

/// 1000 orders, every fourth one failed
fn write_orders(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from("id,status,amount\n");
    for i in 0..1000 {
        let status = if i % 4 == 0 { "failed" } else { "ok" };
        csv.push_str(&format!("{i},{status},{}\n", i * 10));
    }
    let path = dir.join("orders.csv");
    fs::write(&path, csv).unwrap();
    path
}

#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().unwrap();
    shardrun(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Quota-aware partitioned task runner"));
}

#[test]
fn test_cli_version() {
    let temp_dir = TempDir::new().unwrap();
    shardrun(temp_dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shardrun"));
}

#[test]
fn test_invalid_subcommand() {
    let temp_dir = TempDir::new().unwrap();
    shardrun(temp_dir.path())
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_scan_counts_matches_in_column() {
    let temp_dir = TempDir::new().unwrap();
    let orders = write_orders(temp_dir.path());

    shardrun(temp_dir.path())
        .args(["scan", "--column", "status", "--pattern", "^failed$", "--count", "--cpu", "4"])
        .arg(&orders)
        .assert()
        .success()
        .stdout("250\n");
}

#[test]
fn test_scan_prints_matching_rows_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let orders = write_orders(temp_dir.path());

    let assert = shardrun(temp_dir.path())
        .args(["-q", "scan", "--pattern", "^99[0-9]$", "--column", "id", "--min-per-worker", "1"])
        .arg(&orders)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "id,status,amount");
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[1], "990,ok,9900");
    assert_eq!(lines[10], "999,ok,9990");
}

#[test]
fn test_scan_without_headers_matches_any_field() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plain.csv");
    fs::write(&path, "alpha,1\nbeta,2\ngamma,3\n").unwrap();

    shardrun(temp_dir.path())
        .args(["scan", "--no-headers", "--pattern", "^(beta|3)$", "--count"])
        .arg(&path)
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_scan_unknown_column() {
    let temp_dir = TempDir::new().unwrap();
    let orders = write_orders(temp_dir.path());

    shardrun(temp_dir.path())
        .args(["scan", "--column", "missing", "--pattern", "x"])
        .arg(&orders)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown column: missing"));
}

#[test]
fn test_scan_invalid_pattern() {
    let temp_dir = TempDir::new().unwrap();
    let orders = write_orders(temp_dir.path());

    shardrun(temp_dir.path())
        .args(["scan", "--pattern", "("])
        .arg(&orders)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pattern"));
}

#[test]
fn test_scan_missing_file() {
    let temp_dir = TempDir::new().unwrap();

    shardrun(temp_dir.path())
        .args(["scan", "--pattern", "x", "nope.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open nope.csv"));
}

#[test]
fn test_config_show_defaults() {
    let temp_dir = TempDir::new().unwrap();

    shardrun(temp_dir.path())
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"min_items_per_worker\": 80"));
}

#[test]
fn test_config_show_reads_repository_and_env() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("shardrun.toml"),
        "[scan]\ntimeout_ms = 1500\n",
    )
    .unwrap();

    shardrun(temp_dir.path())
        .env("SHARDRUN_PARALLEL__MAX_WORKERS", "3")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_ms = 1500"))
        .stdout(predicate::str::contains("max_workers = 3"));
}

#[test]
fn test_config_show_rejects_unknown_format() {
    let temp_dir = TempDir::new().unwrap();

    shardrun(temp_dir.path())
        .args(["config", "show", "--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported format"));
}
