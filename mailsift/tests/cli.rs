//! CLI acceptance tests
//!
//! Each test points the XDG directories at a fresh temp dir so binaries
//! run against an empty store.

use assert_cmd::Command;
use tempfile::TempDir;

fn mailsift(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mailsift").expect("binary built");
    cmd.env("HOME", dir.path())
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_STATE_HOME", dir.path().join("state"));
    cmd
}

#[test]
fn test_stats_on_fresh_store() {
    let dir = TempDir::new().unwrap();

    let assert = mailsift(&dir).arg("stats").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("Senders: 0"));
    assert!(stdout.contains("Average priority: -"));
}

#[test]
fn test_record_then_list_actions() {
    let dir = TempDir::new().unwrap();

    mailsift(&dir)
        .args(["record", "replied", "a@example.com", "--category", "Work"])
        .assert()
        .success();

    let assert = mailsift(&dir).arg("actions").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("replied"));
    assert!(stdout.contains("a@example.com"));

    // The recorded action also shows up in the sender list
    let assert = mailsift(&dir).arg("senders").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("a@example.com"));
    assert!(stdout.contains("1 interaction"));
}

#[test]
fn test_record_rejects_unknown_action() {
    let dir = TempDir::new().unwrap();

    mailsift(&dir)
        .args(["record", "snoozed", "a@example.com"])
        .assert()
        .failure();
}

#[test]
fn test_history_empty_hint() {
    let dir = TempDir::new().unwrap();

    let assert = mailsift(&dir).arg("history").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("No classification history yet."));
}

#[test]
fn test_analyze_without_providers_reports_configuration_error() {
    let dir = TempDir::new().unwrap();

    let emails = serde_json::json!([
        {
            "sender": "a@example.com",
            "senderName": "A",
            "subject": "Hello",
            "body": "Hi there",
            "date": "Mon",
            "timestamp": 1700000000000u64
        }
    ]);
    let input = dir.path().join("emails.json");
    std::fs::write(&input, emails.to_string()).unwrap();

    let mut cmd = Command::cargo_bin("mailsift-analyze").expect("binary built");
    let assert = cmd
        .env("HOME", dir.path())
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_STATE_HOME", dir.path().join("state"))
        .arg(&input)
        .assert()
        .failure();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("configuration error"));
}
