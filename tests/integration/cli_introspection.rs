use predicates::prelude::*;
use test_support::report_cmd;

#[test]
fn list_presets_resolves_against_now() {
  report_cmd()
    .arg("--list-presets")
    .assert()
    .success()
    .stdout(predicate::str::contains("Last Month"))
    .stdout(predicate::str::contains("2025-01-01 to 2025-01-31"))
    .stdout(predicate::str::contains("January 2025"))
    .stdout(predicate::str::contains("2024-10-01 to 2024-12-31"))
    .stdout(predicate::str::contains("Q4 2024"))
    .stdout(predicate::str::contains("2025-02-08 to 2025-02-15"));
}

#[test]
fn list_presets_prints_every_preset() {
  let out = report_cmd().arg("--list-presets").output().unwrap();
  assert!(out.status.success());
  let text = String::from_utf8_lossy(&out.stdout);
  assert_eq!(text.lines().count(), 11);
}

#[test]
fn validate_date_prefers_us_order() {
  report_cmd()
    .args(["--validate-date", "01/02/2025"])
    .assert()
    .success()
    .stdout(predicate::str::contains("2025-01-02"))
    .stdout(predicate::str::contains("Thursday, January 02, 2025"));
}

#[test]
fn validate_date_relative() {
  report_cmd()
    .args(["--validate-date", "30 days ago"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("2025-01-16"));
}

#[test]
fn validate_date_format_error_names_the_input() {
  report_cmd()
    .args(["--validate-date", "2025-13-01"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("'2025-13-01'"))
    .stderr(predicate::str::contains("month 13 out of range"));
}

#[test]
fn validate_date_parse_error_names_the_input() {
  report_cmd()
    .args(["--validate-date", "not a date"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("could not parse date 'not a date'"));
}
