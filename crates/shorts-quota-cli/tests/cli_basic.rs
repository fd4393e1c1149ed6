//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary HOME, so the
//! store and config file never leak between tests.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_shorts-quota"))
        .args(args)
        .env("HOME", home)
        .env_remove("SHORTS_QUOTA_ENV")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_status_defaults() {
    let home = tempfile::tempdir().unwrap();
    let status = run_json(home.path(), &["status"]);
    assert_eq!(status["count"], 0);
    assert_eq!(status["maxShorts"], 5);
    assert_eq!(status["enabled"], true);
    assert_eq!(status["status"], "Available");
}

#[test]
fn test_limit_updates_badge() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(home.path(), &["limit", "8"]);
    assert_eq!(out["maxShorts"], 8);
    assert_eq!(out["badge"], "8");
    assert_eq!(run_json(home.path(), &["status"])["maxShorts"], 8);
}

#[test]
fn test_limit_rejects_non_positive() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["limit", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
    let (_, _, code) = run_cli(home.path(), &["limit", "-2"]);
    assert_eq!(code, 1);
}

#[test]
fn test_toggle_and_enable() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(run_json(home.path(), &["toggle"])["enabled"], false);
    assert_eq!(run_json(home.path(), &["status"])["enabled"], false);
    run_json(home.path(), &["enable"]);
    assert_eq!(run_json(home.path(), &["status"])["enabled"], true);
}

#[test]
fn test_badge_off() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(home.path(), &["badge", "off"]);
    assert_eq!(out["badge"], "");
    assert_eq!(run_json(home.path(), &["status"])["badgeEnabled"], false);
}

#[test]
fn test_simulate_reaches_limit() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(
        home.path(),
        &["simulate", "--views", "7", "--dwell-secs", "6"],
    );
    assert_eq!(out["counted"], 5);
    assert_eq!(out["status"]["count"], 5);
    assert_eq!(out["status"]["status"], "LimitReached");
    assert_eq!(out["badge"], "0");
    assert_eq!(out["overlays"], serde_json::json!([1]));

    // The persistent store kept the count.
    assert_eq!(run_json(home.path(), &["status"])["count"], 5);

    let reset = run_json(home.path(), &["reset"]);
    assert_eq!(reset["badge"], "5");
    assert_eq!(run_json(home.path(), &["status"])["count"], 0);
}

#[test]
fn test_simulate_short_dwell_counts_nothing() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(
        home.path(),
        &["simulate", "--views", "4", "--dwell-secs", "5", "--in-memory"],
    );
    assert_eq!(out["counted"], 0);
    assert_eq!(out["status"]["count"], 0);
}

#[test]
fn test_history_and_sweep() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["simulate", "--views", "2"]);

    let history = run_json(home.path(), &["history", "--json"]);
    let days = history.as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["count"], 2);

    let report = run_json(home.path(), &["sweep"]);
    assert_eq!(report["scanned"], 1);
    assert_eq!(report["removed"], serde_json::json!([]));
}

#[test]
fn test_lifecycle_update_keeps_limit() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["lifecycle", "install"]);
    assert_eq!(code, 0);
    run_json(home.path(), &["limit", "9"]);
    let (_, _, code) = run_cli(home.path(), &["lifecycle", "update"]);
    assert_eq!(code, 0);
    assert_eq!(run_json(home.path(), &["status"])["maxShorts"], 9);

    let startup = run_json(home.path(), &["lifecycle", "startup"]);
    assert_eq!(startup["alarm"], "cleanupOldData");
    assert_eq!(startup["periodMinutes"], 60);
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "accrual.dwell_threshold_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5000");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "retention.horizon_days", "3"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "retention.horizon_days"]);
    assert_eq!(stdout.trim(), "3");

    let (_, _, code) = run_cli(home.path(), &["config", "get", "nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_set_rejects_unusable_values() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "site.tab_pattern", "garbage"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
    let (_, _, code) = run_cli(home.path(), &["config", "set", "retention.sweep_period_min", "0"]);
    assert_eq!(code, 1);

    // Panel commands keep working on the untouched config.
    assert_eq!(run_json(home.path(), &["status"])["maxShorts"], 5);
}
