use std::path::Path;

use test_support::{fixture_path, read_fixture_text, read_json, report_cmd, tempdir, write_records_csv};

const STAMP: &str = "20250215-120000";

fn records() -> String {
  fixture_path("records.csv").to_string_lossy().to_string()
}

fn read(dir: &Path, name: &str) -> String {
  std::fs::read_to_string(dir.join(name)).unwrap_or_else(|e| panic!("reading {name}: {e}"))
}

fn table<'a>(page: &'a serde_json::Value, id: &str) -> &'a serde_json::Value {
  page["tables"].as_array().unwrap().iter().find(|t| t["id"] == id).unwrap()
}

#[test]
fn month_run_writes_every_page() {
  let out = tempdir();
  let assert = report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  let pointer: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
  assert_eq!(pointer["manifest"], "manifest.json");

  let manifest = read_json(&out.path().join("manifest.json"));
  let ids: Vec<&str> = manifest["pages"].as_array().unwrap().iter().map(|p| p["id"].as_str().unwrap()).collect();
  assert_eq!(ids, vec!["project-statistics", "branch-breakdown", "youth-development", "senior-centers"]);
  let data_rows = read_fixture_text("records.csv").lines().count() - 1;
  assert_eq!(manifest["cleaning"]["rows_loaded"], data_rows);
  assert_eq!(manifest["cleaning"]["dropped_zero_hours"], 1);
  assert_eq!(manifest["period"]["description"], "January 2025");

  for page in manifest["pages"].as_array().unwrap() {
    for f in page["files"].as_array().unwrap() {
      assert!(out.path().join(f["file"].as_str().unwrap()).exists(), "missing {}", f["file"]);
    }
  }
}

#[test]
fn branch_hours_csv_is_sorted_and_sparse() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--page", "branch-breakdown"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .success();

  let csv = read(out.path(), &format!("branch-breakdown_hours_{STAMP}.csv"));
  insta::assert_snapshot!(csv, @r"
  Branch,Total Hours
  Downtown YMCA,9.5
  Eastside YMCA,7.5
  Music Resource Center,6
  R.C. Durr YMCA,5
  Clippard Senior Center,3
  Clippard YMCA,2
  ");

  let page = read_json(&out.path().join(format!("branch-breakdown_{STAMP}.json")));
  let active = table(&page, "active-volunteers");
  assert_eq!(active["rows"][0]["key"], "Eastside YMCA");
  assert_eq!(active["rows"][0]["value"], 3.0);
  let members = table(&page, "member-volunteers");
  let keys: Vec<&str> = members["rows"].as_array().unwrap().iter().map(|r| r["key"].as_str().unwrap()).collect();
  assert!(!keys.contains(&"Music Resource Center"), "no member rows there: {keys:?}");
  assert_eq!(table(&page, "summary")["rows"][1]["key"], "Total Hours");
  assert_eq!(table(&page, "summary")["rows"][1]["value"], 33.0);
}

#[test]
fn classified_pages_group_by_keyword_rules() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01"])
    .args(["--page", "youth-development", "--page", "senior-centers"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .success();

  let yde = read_json(&out.path().join(format!("youth-development_{STAMP}.json")));
  let hours = table(&yde, "hours");
  assert_eq!(hours["rows"][0]["key"], "YDE - Community Services");
  assert_eq!(hours["rows"][0]["value"], 10.0);
  assert_eq!(hours["rows"].as_array().unwrap().len(), 3);

  let senior = read_json(&out.path().join(format!("senior-centers_{STAMP}.json")));
  let vols = table(&senior, "volunteers");
  assert_eq!(vols["rows"][0]["key"], "Clippard YMCA + Clippard Senior Center");
  assert_eq!(vols["rows"][0]["value"], 2.0);

  let text = read(out.path(), &format!("senior-centers_summary_{STAMP}.txt"));
  assert!(text.starts_with("Senior Centers\nPeriod: January 2025 (2025-01-01 to 2025-01-31, 31 days, monthly)"));
  assert!(text.contains("Senior Center Hours: 10 total hours across 2 groups"));
}

#[test]
fn compare_previous_adds_change_section() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--page", "branch-breakdown", "--compare-previous"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .success();

  let page = read_json(&out.path().join(format!("branch-breakdown_{STAMP}.json")));
  assert_eq!(page["previous_period"]["description"], "December 2024");
  let hours = page["comparison"].as_array().unwrap().iter().find(|c| c["table"] == "hours").unwrap();
  assert_eq!(hours["previous"], 5.0);
  assert_eq!(hours["current"], 33.0);
  assert_eq!(hours["significance"], "HIGH");

  let text = read(out.path(), &format!("branch-breakdown_summary_{STAMP}.txt"));
  assert!(text.contains("Compared with previous period (December 2024):"));
  assert!(text.contains("  - hours: 5 -> 33 (+28, +560%) [HIGH]"));
}

#[test]
fn rerun_into_same_directory_archives_old_files() {
  let out = tempdir();
  for _ in 0..2 {
    report_cmd()
      .args(["--input", &records(), "--month", "2025-01", "--page", "senior-centers"])
      .args(["--out", out.path().to_str().unwrap()])
      .assert()
      .success();
  }
  let archive = out.path().join("archive");
  assert!(archive.join("manifest_20250215_120000.json").exists());
  assert!(archive.join("senior-centers_hours_20250215-120000_20250215_120000.csv").exists());
}

#[test]
fn global_dedupe_reduces_hours() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--page", "branch-breakdown"])
    .args(["--dedupe", "assignee-branch", "--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  let page = read_json(&out.path().join(format!("branch-breakdown_{STAMP}.json")));
  // Ann's later Downtown shifts collapse into her first one.
  let rows = table(&page, "hours")["rows"].as_array().unwrap().clone();
  let downtown = rows.iter().find(|r| r["key"] == "Downtown YMCA").unwrap();
  assert_eq!(downtown["value"], 6.5);
  assert_eq!(rows[0]["key"], "Eastside YMCA");
  let manifest = read_json(&out.path().join("manifest.json"));
  assert!(manifest["cleaning"]["removed_duplicates"].as_u64().unwrap() >= 1);
}

#[test]
fn json_input_is_accepted() {
  let dir = tempdir();
  let input = dir.path().join("records.json");
  std::fs::write(
    &input,
    r#"{"items":[
      {"assignee":"Ann","branch":"A","category":"Swim","project":"Meet","creditedHours":5,"volunteerDate":"2025-01-10"},
      {"assignee":"Bob","branch":"A","category":"Swim","project":"Meet","creditedHours":3,"volunteerDate":"2025-01-20"},
      {"assignee":"Cy","branch":"B","category":"Art","project":"Mural","creditedHours":0,"volunteerDate":"2025-01-15"}
    ]}"#,
  )
  .unwrap();
  let out = dir.path().join("out");
  report_cmd()
    .args(["--input", input.to_str().unwrap(), "--start", "2025-01-01", "--end", "2025-01-31"])
    .args(["--page", "branch-breakdown", "--out", out.to_str().unwrap()])
    .assert()
    .success();
  let page = read_json(&out.join(format!("branch-breakdown_{STAMP}.json")));
  let hours = table(&page, "hours");
  assert_eq!(hours["rows"].as_array().unwrap().len(), 1);
  assert_eq!(hours["rows"][0]["key"], "A");
  assert_eq!(hours["rows"][0]["value"], 8.0);
}

#[test]
fn headerless_garbage_fails_with_validation_error() {
  let dir = tempdir();
  let input = write_records_csv(dir.path(), "bad.csv", "foo,bar", &["1,2", "3,4"]);
  report_cmd()
    .args(["--input", input.to_str().unwrap(), "--month", "2025-01"])
    .args(["--out", dir.path().join("out").to_str().unwrap()])
    .assert()
    .failure()
    .stderr(predicates::str::contains("no usable hours or date column"));
}

#[test]
fn unknown_page_is_rejected() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--page", "finance"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .failure()
    .stderr(predicates::str::contains("unknown page 'finance'"));
}

fn future_input(dir: &Path) -> std::path::PathBuf {
  write_records_csv(
    dir,
    "future.csv",
    "contact_name,branch,PROJECT_TAG,assignment,creditedHours,volunteerDate",
    &[
      "Ann,Downtown YMCA,Swim,Timer,4,2025-01-04",
      "Bob,Downtown YMCA,Swim,Timer,3,2025-01-18",
      "Cy,Eastside YMCA,Art,Mural,2,2999-01-01",
    ],
  )
}

#[test]
fn future_dated_rows_are_dropped_and_reported() {
  let dir = tempdir();
  let input = future_input(dir.path());
  let out = dir.path().join("out");
  report_cmd()
    .args(["--input", input.to_str().unwrap(), "--month", "2025-01"])
    .args(["--page", "branch-breakdown", "--out", out.to_str().unwrap()])
    .assert()
    .success();

  let manifest = read_json(&out.join("manifest.json"));
  assert_eq!(manifest["cleaning"]["dropped_future"], 1);
  assert_eq!(manifest["cleaning"]["rows_kept"], 2);
  let kinds: Vec<&str> = manifest["quality"]["issues"]
    .as_array()
    .unwrap()
    .iter()
    .map(|i| i["kind"].as_str().unwrap())
    .collect();
  assert!(kinds.contains(&"future_dates"), "{kinds:?}");

  let page = read_json(&out.join(format!("branch-breakdown_{STAMP}.json")));
  let notes: Vec<&str> = page["notes"].as_array().unwrap().iter().map(|n| n.as_str().unwrap()).collect();
  assert!(notes.iter().any(|n| n.contains("1 rows dated after today dropped")), "{notes:?}");
  assert!(notes.iter().any(|n| n.starts_with("data quality ")), "{notes:?}");
  let warned = page["warnings"].as_array().unwrap().iter().any(|w| w.as_str().unwrap().contains("--allow-future"));
  assert!(warned, "{}", page["warnings"]);
}

#[test]
fn allow_future_keeps_future_dated_rows() {
  let dir = tempdir();
  let input = future_input(dir.path());
  let out = dir.path().join("out");
  report_cmd()
    .args(["--input", input.to_str().unwrap(), "--month", "2025-01", "--allow-future"])
    .args(["--page", "branch-breakdown", "--out", out.to_str().unwrap()])
    .assert()
    .success();

  let manifest = read_json(&out.join("manifest.json"));
  assert_eq!(manifest["cleaning"]["dropped_future"], 0);
  assert_eq!(manifest["cleaning"]["rows_kept"], 3);
}

#[test]
fn clean_fixture_scores_full_quality() {
  let out = tempdir();
  report_cmd()
    .args(["--input", &records(), "--month", "2025-01", "--page", "senior-centers"])
    .args(["--out", out.path().to_str().unwrap()])
    .assert()
    .success();
  let manifest = read_json(&out.path().join("manifest.json"));
  assert_eq!(manifest["quality"]["score"], 100);
  assert_eq!(manifest["quality"]["rating"], "Excellent");
}
