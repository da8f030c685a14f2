//! Integration tests for the trajexp binary
//!
//! None of these reach the network: every run fails validation or argument
//! parsing before a fetch would start.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn trajexp(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_trajexp"))
        .current_dir(dir)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_config_json_lists_every_option() {
    let dir = TempDir::new().unwrap();
    let output = trajexp(dir.path(), &["config", "--json", "--radius", "30"]);

    assert!(output.status.success(), "Command should succeed");
    let parsed = stdout_json(&output);
    assert_eq!(parsed["status"], "success");

    let values = parsed["data"]["values"].as_array().unwrap();
    let radius = values.iter().find(|v| v["key"] == "exposureRadius").unwrap();
    assert_eq!(radius["value"], "30.0");
    assert_eq!(radius["source"], "Cli");

    let cutoff = values.iter().find(|v| v["key"] == "cutoffDistance").unwrap();
    assert_eq!(cutoff["source"], "Default");
}

#[test]
fn test_config_file_in_working_directory_is_used() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("trajexp.toml"), "cutoffDistance = 250.0\n").unwrap();

    let output = trajexp(dir.path(), &["config", "--json"]);
    assert!(output.status.success());

    let parsed = stdout_json(&output);
    let values = parsed["data"]["values"].as_array().unwrap();
    let cutoff = values.iter().find(|v| v["key"] == "cutoffDistance").unwrap();
    assert_eq!(cutoff["value"], "250.0");
    assert_eq!(cutoff["source"], "File");
}

#[test]
fn test_run_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = trajexp(dir.path(), &["run", "missing.geojson"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cannot read trajectory file"));
}

#[test]
fn test_run_invalid_config_fails_before_loading() {
    let dir = TempDir::new().unwrap();
    let output = trajexp(dir.path(), &["run", "missing.geojson", "--parallelism", "0"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("parallelism"));
}

#[test]
fn test_run_reports_invalid_trajectory_per_item() {
    let dir = TempDir::new().unwrap();
    let content = r#"{
        "type": "Feature",
        "properties": {"id": "lonely"},
        "geometry": {"type": "LineString", "coordinates": [[13.40, 52.51]]}
    }"#;
    std::fs::write(dir.path().join("one.geojson"), content).unwrap();

    let output = trajexp(dir.path(), &["--json", "run", "one.geojson"]);

    assert!(output.status.success(), "Per-trajectory failures do not fail the run");
    let parsed = stdout_json(&output);
    let data = &parsed["data"];
    assert_eq!(data["status"], "PartiallyFailed");
    assert_eq!(data["failed"], 1);
    assert_eq!(data["trajectories"][0]["trajectory_id"], "lonely");
    assert_eq!(data["trajectories"][0]["status"], "failed");
    assert_eq!(data["trajectories"][0]["error"]["stage"], "validate");
    assert_eq!(data["trajectories"][0]["error"]["retryable"], false);
    assert!(data["trajectories"][0]["records"].is_null());
}

#[test]
fn test_fetch_rejects_malformed_bbox() {
    let dir = TempDir::new().unwrap();
    let output = trajexp(dir.path(), &["fetch", "--bbox", "bad"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid bounding box"));
}
