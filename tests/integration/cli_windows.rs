use predicates::prelude::*;
use test_support::{fixture_path, report_cmd, tempdir};

fn records() -> String {
  fixture_path("records.csv").to_string_lossy().to_string()
}

#[test]
fn errors_when_no_time_selection() {
  report_cmd()
    .args(["--input", &records()])
    .assert()
    .failure()
    .stderr(predicate::str::contains(
      "Provide one of --preset, --for, --month, --all, or (--start AND --end)",
    ));
}

#[test]
fn errors_on_ambiguous_selection() {
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--preset", "Last Month"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Ambiguous time selection"));
}

#[test]
fn inverted_range_is_rejected() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--start", "2025-01-31", "--end", "2025-01-01"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .failure()
    .stderr(predicate::str::contains("start 2025-01-31 is after end 2025-01-01"));
}

#[test]
fn range_too_large_respects_max_days() {
  let out = tempdir();
  let out_path = out.path().to_str().unwrap();
  report_cmd()
    .args(["--input", &records(), "--start", "2023-12-01", "--end", "2025-01-04", "--out", out_path])
    .assert()
    .failure()
    .stderr(predicate::str::contains("400 days"))
    .stderr(predicate::str::contains("maximum of 365 days"));

  report_cmd()
    .args(["--input", &records(), "--start", "2023-12-01", "--end", "2025-01-04", "--out", out_path])
    .args(["--max-days", "400"])
    .assert()
    .success();
}

#[test]
fn future_end_needs_allow_future() {
  let out = tempdir();
  let out_path = out.path().to_str().unwrap();
  report_cmd()
    .args(["--input", &records(), "--start", "2025-02-01", "--end", "2025-02-28", "--out", out_path])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--allow-future"));

  report_cmd()
    .args(["--input", &records(), "--start", "2025-02-01", "--end", "2025-02-28", "--out", out_path])
    .arg("--allow-future")
    .assert()
    .success();
}

#[test]
fn unknown_preset_lists_choices() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--preset", "Next Decade", "--out", out.path().to_str().unwrap()])
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown preset 'Next Decade'"))
    .stderr(predicate::str::contains("Year to Date"));
}

#[test]
fn for_phrase_last_month_smoke() {
  let out = tempdir();
  let assert = report_cmd()
    .args(["--input", &records(), "--for", "last month", "--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  let v: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  assert_eq!(v["manifest"], "manifest.json");
  let m = test_support::read_json(&out.path().join("manifest.json"));
  assert_eq!(m["period"]["start"], "2025-01-01");
  assert_eq!(m["period"]["end"], "2025-01-31");
}

#[test]
fn all_flag_spans_the_input() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--all", "--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  let m = test_support::read_json(&out.path().join("manifest.json"));
  assert_eq!(m["period"]["start"], "2024-12-14");
  assert_eq!(m["period"]["end"], "2025-01-30");
}
