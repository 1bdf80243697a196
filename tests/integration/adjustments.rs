use test_support::{fixture_path, read_fixture_json, read_json, report_cmd, tempdir};

const STAMP: &str = "20250215-120000";

fn run_args(out: &std::path::Path) -> Vec<String> {
  vec![
    "--input".into(),
    fixture_path("records.csv").to_string_lossy().to_string(),
    "--month".into(),
    "2025-01".into(),
    "--page".into(),
    "project-statistics".into(),
    "--config".into(),
    fixture_path("adjustments.json").to_string_lossy().to_string(),
    "--out".into(),
    out.to_string_lossy().to_string(),
  ]
}

#[test]
fn matched_adjustment_is_recorded_and_unmatched_one_warns() {
  let out = tempdir();
  report_cmd().args(run_args(out.path())).assert().success();

  let page = read_json(&out.path().join(format!("project-statistics_{STAMP}.json")));
  let overrides = page["overrides"].as_array().unwrap();
  assert_eq!(overrides.len(), 1);
  assert_eq!(overrides[0]["table"], "projects");
  assert_eq!(overrides[0]["key"], "Competitive Swim");
  assert_eq!(overrides[0]["old"], 2.0);
  assert_eq!(overrides[0]["new"], 1.0);

  let projects = page["tables"].as_array().unwrap().iter().find(|t| t["id"] == "projects").unwrap();
  assert!(projects["rows"].as_array().unwrap().iter().all(|r| r["value"] == 1.0));

  let warnings: Vec<&str> = page["warnings"].as_array().unwrap().iter().map(|w| w.as_str().unwrap()).collect();
  assert!(warnings.iter().any(|w| w.contains("'Water Polo'")), "warnings: {warnings:?}");

  let manifest = read_json(&out.path().join("manifest.json"));
  assert_eq!(manifest["pages"][0]["overrides"], 1);
  let cfg: serde_json::Value = read_fixture_json("adjustments.json");
  assert_eq!(manifest["config"]["top_n"], cfg["top_n"]);
  assert_eq!(manifest["config"]["adjustments"]["project-statistics.projects"]["Water Polo"], 4.0);

  let text = std::fs::read_to_string(out.path().join(format!("project-statistics_summary_{STAMP}.txt"))).unwrap();
  assert!(text.contains("Manual adjustments:\n  - projects / Competitive Swim: 2 -> 1\n"));
  assert!(text.contains("  Top 3:"));
}

#[test]
fn strict_adjustments_fail_on_unknown_group() {
  let out = tempdir();
  report_cmd()
    .args(run_args(out.path()))
    .arg("--strict-adjustments")
    .assert()
    .failure()
    .stderr(predicates::str::contains("Water Polo"));
  assert!(!out.path().join("manifest.json").exists());
}

#[test]
fn cli_top_n_beats_config_file() {
  let out = tempdir();
  report_cmd().args(run_args(out.path())).args(["--top-n", "1"]).assert().success();
  let text = std::fs::read_to_string(out.path().join(format!("project-statistics_summary_{STAMP}.txt"))).unwrap();
  assert!(text.contains("  Top 1:"));
  assert!(!text.contains("  Top 3:"));
}
