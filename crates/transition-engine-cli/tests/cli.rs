use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::NamedTempFile;

// 2021-01-01T00:00:00Z
const MIDNIGHT: i64 = 1_609_459_200;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("temporal-cache").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn records() -> String {
    serde_json::json!([
        {
            "id": 1,
            "source_kind": "pages",
            "label": "Launch page",
            "visible_from": MIDNIGHT + 3_600,
        },
        {
            "id": 2,
            "source_kind": "tt_content",
            "label": "Banner",
            "container_id": 1,
            "visible_until": MIDNIGHT + 7_200,
        },
        {
            "id": 3,
            "source_kind": "tt_content",
            "label": "Plain",
            "container_id": 1,
        }
    ])
    .to_string()
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

// ── next ────────────────────────────────────────────────────────────────────

#[test]
fn test_next_reads_records_from_stdin() {
    let out = json_output(
        cli()
            .args(["next", "--now", &MIDNIGHT.to_string()])
            .write_stdin(records()),
    );
    assert_eq!(out["next_transition"], MIDNIGHT + 3_600);
    assert_eq!(out["seconds_until"], 3_600);
    assert_eq!(out["cache_lifetime"], 3_600);
}

#[test]
fn test_next_without_bounds_keeps_lifetime() {
    let out = json_output(
        cli()
            .args(["next", "--now", &MIDNIGHT.to_string(), "--lifetime", "600"])
            .write_stdin("[]"),
    );
    assert!(out["next_transition"].is_null());
    assert_eq!(out["cache_lifetime"], 600);
}

#[test]
fn test_next_scheduler_timing_from_settings_file() {
    let mut settings = NamedTempFile::new().unwrap();
    write!(settings, r#"{{"timing": {{"strategy": "scheduler"}}}}"#).unwrap();

    let out = json_output(
        cli()
            .arg("--settings")
            .arg(settings.path())
            .args(["next", "--now", &MIDNIGHT.to_string()])
            .write_stdin(records()),
    );
    assert_eq!(out["next_transition"], MIDNIGHT + 3_600);
    assert_eq!(out["cache_lifetime"], 86_400);
}

#[test]
fn test_malformed_slots_only_affect_harmonizing_commands() {
    let mut settings = NamedTempFile::new().unwrap();
    write!(settings, r#"{{"harmonization": {{"enabled": false, "slots": "noon"}}}}"#).unwrap();

    let out = json_output(
        cli()
            .arg("--settings")
            .arg(settings.path())
            .args(["next", "--now", "0"])
            .write_stdin("[]"),
    );
    assert!(out["next_transition"].is_null());

    for args in [
        vec!["window", "--after", "0", "--until", "60"],
        vec!["stats", "--filter", "active"],
    ] {
        cli()
            .arg("--settings")
            .arg(settings.path())
            .args(&args)
            .write_stdin("[]")
            .assert()
            .success();
    }

    cli()
        .arg("--settings")
        .arg(settings.path())
        .args(["stats", "--filter", "harmonizable"])
        .write_stdin("[]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid slot 'noon'"));
}

#[test]
fn test_next_reads_records_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(records().as_bytes()).unwrap();

    let out = json_output(cli().args(["next", "--now", &(MIDNIGHT + 5_000).to_string()]).arg(
        format!("--records={}", file.path().display()),
    ));
    assert_eq!(out["next_transition"], MIDNIGHT + 7_200);
}

#[test]
fn test_next_rejects_malformed_records() {
    cli()
        .args(["next", "--now", "0"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing records"));
}

// ── harmonize ───────────────────────────────────────────────────────────────

#[test]
fn test_harmonize_snaps_to_nearest_slot() {
    let out = json_output(cli().args([
        "harmonize",
        "--enable-harmonization",
        &(MIDNIGHT + 1_800).to_string(),
    ]));
    assert_eq!(out[0]["harmonized"], MIDNIGHT);
    assert_eq!(out[0]["shift_seconds"], -1_800);
    assert_eq!(out[0]["within_tolerance"], true);
}

#[test]
fn test_harmonize_custom_slots_and_tolerance() {
    let out = json_output(cli().args([
        "harmonize",
        "--enable-harmonization",
        "--slots",
        "08:00, 20:00",
        "--tolerance",
        "60",
        &(MIDNIGHT + 3_600).to_string(),
    ]));
    // 01:00 is nearest to 20:00 of the previous day.
    assert_eq!(out[0]["harmonized"], MIDNIGHT - 4 * 3_600);
    assert_eq!(out[0]["within_tolerance"], false);
}

#[test]
fn test_harmonize_disabled_fails() {
    cli()
        .args(["harmonize", &MIDNIGHT.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("disabled"));
}

#[test]
fn test_harmonize_invalid_slot_fails() {
    cli()
        .args(["harmonize", "--enable-harmonization", "--slots", "25:00", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid slot '25:00'"));
}

// ── impact ──────────────────────────────────────────────────────────────────

#[test]
fn test_impact_empty_batch_is_zero() {
    let out = json_output(
        cli()
            .args(["impact", "--enable-harmonization"])
            .write_stdin("[]"),
    );
    assert_eq!(out["original_count"], 0);
    assert_eq!(out["harmonized_count"], 0);
    assert_eq!(out["reduction_percent"], 0.0);
}

#[test]
fn test_impact_merges_bounds_into_one_slot() {
    let out = json_output(
        cli()
            .args(["impact", "--enable-harmonization", "--tolerance", "7200"])
            .write_stdin(records()),
    );
    // 01:00 and 02:00 both snap to 00:00.
    assert_eq!(out["original_count"], 2);
    assert_eq!(out["harmonized_count"], 1);
    assert_eq!(out["reduction_percent"], 50.0);
    assert_eq!(out["within_tolerance_count"], 2);
}

// ── stats / window / plan ───────────────────────────────────────────────────

#[test]
fn test_stats_counts_and_filter() {
    let out = json_output(
        cli()
            .args(["stats", "--now", &MIDNIGHT.to_string()])
            .write_stdin(records()),
    );
    assert_eq!(out["statistics"]["total"], 3);
    assert_eq!(out["statistics"]["pages"], 1);
    assert_eq!(out["statistics"]["content"], 2);

    let out = json_output(
        cli()
            .args(["stats", "--filter", "pages", "--now", &MIDNIGHT.to_string()])
            .write_stdin(records()),
    );
    assert_eq!(out["filter"], "pages");
    assert_eq!(out["ids"], serde_json::json!([1]));
}

#[test]
fn test_stats_unknown_filter_fails() {
    cli()
        .args(["stats", "--filter", "recent"])
        .write_stdin("[]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid filter"));
}

#[test]
fn test_window_lists_transitions_in_order() {
    let out = json_output(
        cli()
            .args([
                "window",
                "--after",
                &MIDNIGHT.to_string(),
                "--until",
                &(MIDNIGHT + 7_200).to_string(),
            ])
            .write_stdin(records()),
    );
    let list = out.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["record_id"], 1);
    assert_eq!(list[0]["kind"], "start");
    assert_eq!(list[1]["record_id"], 2);
    assert_eq!(list[1]["kind"], "end");
}

#[test]
fn test_window_rejects_inverted_range() {
    cli()
        .args(["window", "--after", "100", "--until", "50"])
        .write_stdin("[]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("before --after"));
}

#[test]
fn test_plan_skips_unknown_ids() {
    let out = json_output(
        cli()
            .args(["plan", "--enable-harmonization", "--ids", "1,9"])
            .write_stdin(records()),
    );
    assert_eq!(out["entries"][0]["record_id"], 1);
    assert_eq!(out["entries"][0]["visible_from"]["harmonized"], MIDNIGHT);
    assert_eq!(out["skipped"], serde_json::json!([9]));
}
