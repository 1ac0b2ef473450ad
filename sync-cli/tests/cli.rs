//! End-to-end tests for the lanchat binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const SCRIPT: &str = r#"{
  "user_id": "alice",
  "peers": [{
    "profile": { "user_id": "bob", "username": "bob", "display_name": "Bob", "status": "Online" },
    "address": { "ip": "10.0.0.2", "port": 7000 },
    "last_seen": "2024-05-01T10:00:00Z"
  }],
  "events": [
    { "channel": "message-received", "payload": {
        "id": "m1", "session_id": "s1", "sender_id": "bob", "recipient_id": "alice",
        "message_type": "Text", "content": "hello alice",
        "timestamp": "2024-05-01T10:01:00Z", "status": "Delivered" } },
    { "channel": "peer-discovered", "payload": "not a peer" }
  ]
}"#;

fn lanchat() -> Command {
    Command::cargo_bin("lanchat").unwrap()
}

#[test]
fn init_then_refuse_without_force() {
    let dir = tempdir().unwrap();

    lanchat()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .args(["init", "--username", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));

    assert!(dir.path().join("lanchat.toml").exists());

    lanchat()
        .args(["--data-dir", dir.path().to_str().unwrap(), "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    lanchat()
        .args(["--data-dir", dir.path().to_str().unwrap(), "init", "--force"])
        .assert()
        .success();
}

#[test]
fn replay_prints_model() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("script.json");
    std::fs::write(&script, SCRIPT).unwrap();

    lanchat()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .arg("replay")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello alice"))
        .stdout(predicate::str::contains("Dropped:   1"));
}

#[test]
fn replay_json_output() {
    let dir = tempdir().unwrap();
    let script = dir.path().join("script.json");
    std::fs::write(&script, SCRIPT).unwrap();

    let output = lanchat()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .arg("replay")
        .arg(&script)
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["peers"].as_array().unwrap().len(), 1);
    assert_eq!(report["events"]["delivered"], 1);
    assert_eq!(report["events"]["dropped"], 1);
}

#[test]
fn replay_missing_script_fails() {
    let dir = tempdir().unwrap();

    lanchat()
        .args(["--data-dir", dir.path().to_str().unwrap()])
        .args(["replay", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read script"));
}

#[test]
fn init_and_replay_share_custom_config() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let config = dir.path().join("custom.toml");
    let script = dir.path().join("script.json");
    std::fs::write(&script, SCRIPT).unwrap();

    lanchat()
        .args(["--data-dir", data_dir.to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .args(["init", "--username", "zed"])
        .assert()
        .success();

    assert!(config.exists());
    assert!(!data_dir.join("lanchat.toml").exists());

    lanchat()
        .args(["--data-dir", data_dir.to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .arg("replay")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("(zed)"));
}
