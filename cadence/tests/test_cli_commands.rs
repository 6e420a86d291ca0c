mod common;

use common::{fixture, json_lines, run, stdout_lines};

#[test]
fn validate_valid_sequence() {
    let output = run(&["validate", &fixture("blink.yaml")]);
    assert!(
        output.status.success(),
        "validate should succeed for a valid sequence: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ok"), "{stdout}");
    assert!(stdout.contains("2 phases, 150ms per pass"), "{stdout}");
}

#[test]
fn validate_negative_duration_fails_with_config_code() {
    let output = run(&["validate", &fixture("negative_duration.yaml")]);
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("FAIL"), "{stdout}");
}

#[test]
fn validate_json_output() {
    let output = run(&[
        "validate",
        "--format",
        "json",
        &fixture("blink.yaml"),
        &fixture("negative_duration.yaml"),
    ]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("output should be valid JSON");
    let files = parsed.as_array().expect("JSON output should be an array");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["valid"], true);
    assert_eq!(files[0]["phases"], 2);
    assert_eq!(files[1]["valid"], false);
}

#[test]
fn validate_missing_file() {
    let output = run(&["validate", "/tmp/nonexistent_cadence_test_file.yaml"]);
    assert!(
        !output.status.success(),
        "validate should fail for nonexistent file"
    );
}

#[test]
fn validate_strict_rejects_warnings() {
    let lenient = run(&["validate", &fixture("duplicate_names.yaml")]);
    assert!(lenient.status.success());

    let strict = run(&["validate", "--strict", &fixture("duplicate_names.yaml")]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn list_human_shows_every_scenario() {
    let output = run(&["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "otp-reveal",
        "secure-vault",
        "spam-notifications",
        "realtime-editor",
    ] {
        assert!(stdout.contains(name), "missing {name}: {stdout}");
    }
}

#[test]
fn list_json_filtered_by_tag() {
    let output = run(&["list", "--tag", "auth", "--format", "json"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "otp-reveal");
}

#[test]
fn list_unknown_tag() {
    let output = run(&["list", "--tag", "nothing-has-this"]);
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["No scenarios found."]);
}

#[test]
fn version_human_and_json() {
    let human = run(&["version"]);
    assert!(human.status.success());
    assert!(String::from_utf8_lossy(&human.stdout).starts_with("cadence "));

    let json = run(&["version", "--format", "json"]);
    let parsed = json_lines(&json);
    assert_eq!(parsed[0]["name"], "cadence");
    assert!(parsed[0]["scenarios"].as_array().is_some());
}

#[test]
fn completions_bash() {
    let output = run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cadence"));
}

#[test]
fn missing_source_is_usage_error() {
    let output = run(&["play"]);
    assert_eq!(output.status.code(), Some(2), "clap exits 2 on usage errors");
}
