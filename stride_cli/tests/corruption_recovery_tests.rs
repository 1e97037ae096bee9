//! Corruption recovery tests for the stride binary.
//!
//! These tests verify the system can handle:
//! - Corrupted preference files
//! - Corrupted session log lines
//! - Concurrent writers to the session log

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::thread;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("stride"))
}

/// Temp dir with a default-device config file, returns (dir, data dir, config)
fn setup() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = temp_dir.path().join("data");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[policy]\nstrategy = \"up\"\n").expect("Failed to write config");
    fs::create_dir_all(&data_dir).unwrap();
    (temp_dir, data_dir, config_path)
}

#[test]
fn test_corrupted_prefs_file() {
    let (_temp_dir, data_dir, config) = setup();
    fs::write(data_dir.join("prefs.json"), "{ invalid json }}}}").unwrap();

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(&config)
        .args(["run", "--minutes", "1", "--fast"])
        .assert()
        .success();

    // Prefs are rewritten with the values just used
    let prefs: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_dir.join("prefs.json")).unwrap()).unwrap();
    assert_eq!(prefs["quick_start"]["minutes"], 1);
}

#[test]
fn test_corrupted_log_lines_ignored() {
    let (_temp_dir, data_dir, config) = setup();
    fs::write(
        data_dir.join("sessions.jsonl"),
        "{ invalid json }\n{ more invalid }\n",
    )
    .unwrap();

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(&config)
        .args(["run", "--minutes", "1", "--speed", "2.41", "--fast"])
        .assert()
        .success();

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(&config)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 sessions"));

    // Default device ladder is 0.1 mph apart and the policy rounds up
    let log = fs::read_to_string(data_dir.join("sessions.jsonl")).unwrap();
    let last: serde_json::Value = serde_json::from_str(log.lines().last().unwrap()).unwrap();
    assert_eq!(last["segments"][0]["actual_speed"], 2.5);
}

#[test]
fn test_missing_config_file_fails() {
    let (temp_dir, data_dir, _) = setup();

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(temp_dir.path().join("nope.toml"))
        .arg("presets")
        .assert()
        .failure();
}

#[test]
fn test_concurrent_session_logging() {
    let (_temp_dir, data_dir, config) = setup();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let data_dir = data_dir.clone();
            let config = config.clone();
            thread::spawn(move || {
                cli()
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .arg("--config")
                    .arg(&config)
                    .args(["run", "--minutes", "1", "--fast"])
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("run thread panicked");
    }

    let log = fs::read_to_string(data_dir.join("sessions.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 4);
    for line in log.lines() {
        serde_json::from_str::<serde_json::Value>(line).expect("interleaved write");
    }
}
