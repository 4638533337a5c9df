//! Integration tests for the `dose` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to run the agenda, stats,
//! reminders and count subcommands through the actual binary, including
//! stdin/stdout piping, file I/O, config loading and error handling.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn patient_json_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/patient.json")
}

fn config_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/dose.toml")
}

fn patient_json() -> String {
    std::fs::read_to_string(patient_json_path()).expect("patient.json fixture must exist")
}

fn dose() -> Command {
    let mut cmd = Command::cargo_bin("dose").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run a command that must succeed and parse its stdout as JSON.
fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("dose should run");
    assert!(
        output.status.success(),
        "dose failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// agenda
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn agenda_from_stdin_groups_by_date() {
    let report = run_json(
        dose()
            .args(["agenda", "--from", "2026-03-02", "--to", "2026-03-04"])
            .write_stdin(patient_json()),
    );

    let days = report["medications"].as_object().unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(days["2026-03-02"].as_array().unwrap().len(), 3);
    assert_eq!(days["2026-03-03"].as_array().unwrap().len(), 2);
    assert_eq!(days["2026-03-02"][1]["medicationId"], "med-mtx");
    assert_eq!(days["2026-03-02"][1]["time"], "09:00");

    assert_eq!(report["appointments"]["2026-03-04"][0]["id"], "appt-dialysis");
    assert!(report["skipped"].as_array().unwrap().is_empty());
}

#[test]
fn agenda_file_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("agenda.json");

    dose()
        .args(["agenda", "--from", "2026-03-09", "--to", "2026-03-09", "-i"])
        .arg(patient_json_path())
        .arg("-o")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = std::fs::read_to_string(&output_path).expect("output file must exist");
    let report: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(report["windowStart"], "2026-03-09");
    assert_eq!(report["medications"]["2026-03-09"].as_array().unwrap().len(), 3);
}

#[test]
fn agenda_rejects_inverted_window() {
    dose()
        .args(["agenda", "--from", "2026-03-09", "--to", "2026-03-01"])
        .write_stdin(patient_json())
        .assert()
        .failure()
        .stderr(predicate::str::contains("before"));
}

#[test]
fn agenda_rejects_bad_date_argument() {
    dose()
        .args(["agenda", "--from", "yesterday", "--to", "2026-03-01"])
        .write_stdin(patient_json())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid date"));
}

// ─────────────────────────────────────────────────────────────────────────────
// stats
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stats_reports_per_medication_and_total() {
    let report = run_json(dose().args(["stats", "-i", patient_json_path()]));

    let lisinopril = &report["perMedication"][0];
    assert_eq!(lisinopril["medicationId"], "med-lisinopril");
    assert_eq!(lisinopril["stats"]["taken"], 2);
    assert_eq!(lisinopril["stats"]["notTaken"], 1);
    assert_eq!(lisinopril["stats"]["remaining"], 17);
    assert_eq!(lisinopril["stats"]["totalExpected"], 20);

    let on_demand = &report["perMedication"][2];
    assert_eq!(on_demand["stats"]["taken"], 1);
    assert!(on_demand["stats"]["remaining"].is_null());

    assert_eq!(report["total"]["taken"], 4);
    assert_eq!(report["total"]["remaining"], 20);
    assert_eq!(report["total"]["totalExpected"], 24);
}

#[test]
fn stats_invalid_json_fails() {
    dose()
        .arg("stats")
        .write_stdin("this is not valid json {{{")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse patient bundle"));
}

#[test]
fn stats_skips_malformed_entries_and_reports_the_rest() {
    let mut bundle: Value = serde_json::from_str(&patient_json()).unwrap();
    bundle["medications"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "id": "med-broken", "medicineName": "X" }));
    bundle["intakes"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "medicationId": "med-lisinopril", "status": "taken", "loggedAt": 42 }));

    let report = run_json(dose().arg("stats").write_stdin(bundle.to_string()));

    assert_eq!(report["perMedication"].as_array().unwrap().len(), 3);
    assert_eq!(report["total"]["taken"], 4);
    let skipped: Vec<&str> = report["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(skipped.len(), 2);
    assert!(skipped.contains(&"med-broken"));
}

#[test]
fn missing_input_file_fails() {
    dose()
        .args(["stats", "-i", "/nonexistent/patient.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// reminders
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reminders_with_default_config() {
    let report = run_json(
        dose()
            .args(["reminders", "--now", "2026-03-02T07:30:00Z", "--days", "1"])
            .write_stdin(patient_json()),
    );

    let triggers = report["triggers"].as_array().unwrap();
    // Doses at 08:00, 09:00, 20:00 UTC plus the dialysis day-before and hour-before.
    assert_eq!(triggers.len(), 5);
    assert_eq!(triggers[0]["subjectId"], "med-lisinopril");
    assert_eq!(triggers[0]["fireAt"], "2026-03-02T08:00:00Z");
    assert_eq!(triggers[0]["title"], "Medication reminder");
    assert_eq!(report["replans"]["appt-dialysis"]["scheduled"], 2);
    assert_eq!(report["replans"]["med-prn"]["scheduled"], 0);
}

#[test]
fn reminders_use_config_timezone_and_leads() {
    let report = run_json(
        dose()
            .args(["--config", config_path()])
            .args(["reminders", "--now", "2026-03-02T07:30:00Z", "--days", "1"])
            .args(["-i", patient_json_path()]),
    );

    let triggers = report["triggers"].as_array().unwrap();
    // 08:00 Berlin has passed; 09:00 and 20:00 Berlin remain, plus one hour-before.
    let fire_times: Vec<&str> = triggers.iter().map(|t| t["fireAt"].as_str().unwrap()).collect();
    assert_eq!(
        fire_times,
        vec!["2026-03-02T08:00:00Z", "2026-03-02T19:00:00Z", "2026-03-04T08:00:00Z"]
    );
    assert_eq!(triggers[2]["body"], "Your dialysis session is in 1 hour. Notes: Bring lab results");
}

#[test]
fn reminders_reject_bad_instant() {
    dose()
        .args(["reminders", "--now", "tomorrow morning"])
        .write_stdin(patient_json())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid datetime"));
}

#[test]
fn invalid_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dose.toml");
    std::fs::write(&path, "[schedule]\ndst_policy = \"sometimes\"\n").unwrap();

    dose()
        .arg("--config")
        .arg(&path)
        .args(["count", "-i", patient_json_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}

#[test]
fn unknown_timezone_in_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dose.toml");
    std::fs::write(&path, "[schedule]\ntimezone = \"Atlantis/Capital\"\n").unwrap();

    dose()
        .arg("--config")
        .arg(&path)
        .args(["reminders", "--now", "2026-03-02T07:30:00Z", "-i", patient_json_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Atlantis/Capital"));
}

// ─────────────────────────────────────────────────────────────────────────────
// count
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn count_reports_expected_doses() {
    let report = run_json(dose().arg("count").write_stdin(patient_json()));

    let meds = report["medications"].as_array().unwrap();
    assert_eq!(meds.len(), 3);
    assert_eq!(meds[0]["expected"], 20);
    assert_eq!(meds[1]["expected"], 4);
    assert!(meds[2]["expected"].is_null());
    assert_eq!(meds[1]["rule"]["kind"], "specific_weekdays");
}

#[test]
fn no_subcommand_shows_usage() {
    dose()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
