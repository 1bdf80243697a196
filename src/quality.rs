// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Inspect raw input rows for data quality problems and score the input before cleaning discards anything
// role: processing/diagnostics
// inputs: Raw rows as ingested, reference day
// outputs: QualityReport (issues with severity and counts, completeness, score, rating)
// invariants: Read-only over the raw rows; never drops or changes a record; score stays within 0..=100
// errors: None; every finding is advisory
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{RawRecord, fmt_value};
use crate::range_windows::parse_absolute;

/// Dates older than this many days before the reference day are suspicious.
const OLD_DATE_DAYS: i64 = 365 * 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
}

impl Severity {
  fn name(self) -> &'static str {
    match self {
      Severity::High => "high",
      Severity::Medium => "medium",
      Severity::Low => "low",
    }
  }

  fn penalty(self) -> u32 {
    match self {
      Severity::High => 10,
      Severity::Medium => 5,
      Severity::Low => 2,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
  DuplicateRecords,
  MissingColumn,
  MissingRequiredField,
  InvalidDateFormat,
  FutureDates,
  VeryOldDates,
  InvalidHours,
  NegativeHours,
  Outliers,
  LowCompleteness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
  pub kind: IssueKind,
  pub severity: Severity,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
  pub count: usize,
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
  pub rows: usize,
  /// Percentage of filled cells across every ingested column.
  pub completeness: f64,
  pub score: u32,
  pub rating: String,
  pub issues: Vec<QualityIssue>,
}

impl QualityReport {
  /// One line for the narrative's data notes, then one per issue.
  pub fn notes(&self) -> Vec<String> {
    let mut out = vec![format!(
      "data quality {}/100 ({}); {}% of cells filled",
      self.score,
      self.rating,
      fmt_value(self.completeness)
    )];
    out.extend(self.issues.iter().map(|i| format!("quality ({}): {}", i.severity.name(), i.description)));
    out
  }
}

fn columns(r: &RawRecord) -> [(&'static str, Option<&str>); 7] {
  [
    ("assignee", r.assignee.as_deref()),
    ("branch", r.branch.as_deref()),
    ("category", r.category.as_deref()),
    ("project", r.project.as_deref()),
    ("member", r.member.as_deref()),
    ("hours", r.hours.as_deref()),
    ("date", r.date.as_deref()),
  ]
}

fn filled(v: Option<&str>) -> Option<&str> {
  v.map(str::trim).filter(|s| !s.is_empty())
}

fn issue(kind: IssueKind, severity: Severity, field: Option<&str>, count: usize, description: String) -> QualityIssue {
  QualityIssue {
    kind,
    severity,
    field: field.map(str::to_string),
    count,
    description,
  }
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
  let pos = (sorted.len() - 1) as f64 * q;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn duplicate_rows(raw: &[RawRecord]) -> usize {
  let mut seen: HashMap<&RawRecord, usize> = HashMap::new();
  for r in raw {
    *seen.entry(r).or_default() += 1;
  }
  seen.values().filter(|n| **n > 1).sum()
}

fn missing_fields(raw: &[RawRecord], issues: &mut Vec<QualityIssue>) {
  let total = raw.len();
  let Some(first) = raw.first() else {
    return;
  };
  // Membership is optional; every other column is required.
  let names = columns(first).map(|(name, _)| name);
  for (idx, name) in names.into_iter().enumerate().filter(|(_, n)| *n != "member") {
    let missing = raw.iter().filter(|r| filled(columns(r)[idx].1).is_none()).count();
    if missing == total {
      issues.push(issue(
        IssueKind::MissingColumn,
        Severity::High,
        Some(name),
        missing,
        format!("required field '{name}' not found in the input"),
      ));
    } else if missing > 0 {
      let pct = missing as f64 / total as f64 * 100.0;
      let severity = match pct {
        p if p > 10.0 => Severity::High,
        p if p > 5.0 => Severity::Medium,
        _ => Severity::Low,
      };
      issues.push(issue(
        IssueKind::MissingRequiredField,
        severity,
        Some(name),
        missing,
        format!("field '{name}' has {missing} missing values ({:.1}%)", pct),
      ));
    }
  }
}

fn date_checks(raw: &[RawRecord], today: NaiveDate, issues: &mut Vec<QualityIssue>) {
  let old_threshold = today.checked_sub_signed(Duration::days(OLD_DATE_DAYS)).unwrap_or(NaiveDate::MIN);
  let (mut invalid, mut future, mut old) = (0usize, 0usize, 0usize);
  for text in raw.iter().filter_map(|r| filled(r.date.as_deref())) {
    match parse_absolute(text) {
      None => invalid += 1,
      Some(d) if d > today => future += 1,
      Some(d) if d < old_threshold => old += 1,
      Some(_) => {}
    }
  }
  if invalid > 0 {
    issues.push(issue(
      IssueKind::InvalidDateFormat,
      Severity::Medium,
      Some("date"),
      invalid,
      format!("field 'date' has {invalid} values that are not dates"),
    ));
  }
  if future > 0 {
    issues.push(issue(
      IssueKind::FutureDates,
      Severity::Low,
      Some("date"),
      future,
      format!("field 'date' has {future} dates after {}", today.format("%Y-%m-%d")),
    ));
  }
  if old > 0 {
    issues.push(issue(
      IssueKind::VeryOldDates,
      Severity::Low,
      Some("date"),
      old,
      format!("field 'date' has {old} dates older than 10 years"),
    ));
  }
}

fn hours_checks(raw: &[RawRecord], issues: &mut Vec<QualityIssue>) {
  let mut values = Vec::new();
  let mut invalid = 0usize;
  for text in raw.iter().filter_map(|r| filled(r.hours.as_deref())) {
    match text.parse::<f64>() {
      Ok(v) if v.is_finite() => values.push(v),
      _ => invalid += 1,
    }
  }
  if invalid > 0 {
    issues.push(issue(
      IssueKind::InvalidHours,
      Severity::Medium,
      Some("hours"),
      invalid,
      format!("field 'hours' has {invalid} values that are not numbers"),
    ));
  }
  let negative = values.iter().filter(|v| **v < 0.0).count();
  if negative > 0 {
    issues.push(issue(
      IssueKind::NegativeHours,
      Severity::Medium,
      Some("hours"),
      negative,
      format!("field 'hours' has {negative} negative values"),
    ));
  }

  if values.len() < 4 {
    return;
  }
  values.sort_by(f64::total_cmp);
  let (q1, q3) = (quantile(&values, 0.25), quantile(&values, 0.75));
  let iqr = q3 - q1;
  let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
  let outliers = values.iter().filter(|v| **v < lower || **v > upper).count();
  // A large share of outliers means a skewed distribution rather than bad entries.
  if outliers > 0 && (outliers as f64) < values.len() as f64 * 0.1 {
    issues.push(issue(
      IssueKind::Outliers,
      Severity::Low,
      Some("hours"),
      outliers,
      format!(
        "field 'hours' has {outliers} outliers outside {} to {}",
        fmt_value(lower),
        fmt_value(upper)
      ),
    ));
  }
}

fn completeness(raw: &[RawRecord]) -> (f64, usize, usize) {
  let total = raw.len() * 7;
  let missing = raw
    .iter()
    .map(|r| columns(r).iter().filter(|(_, v)| filled(*v).is_none()).count())
    .sum::<usize>();
  let pct = if total == 0 {
    100.0
  } else {
    ((total - missing) as f64 / total as f64 * 10_000.0).round() / 100.0
  };
  (pct, missing, total)
}

fn rating(score: u32) -> &'static str {
  match score {
    90.. => "Excellent",
    80..=89 => "Good",
    70..=79 => "Fair",
    50..=69 => "Poor",
    _ => "Very Poor",
  }
}

/// Check raw rows for duplicates, missing fields, suspicious dates and hours, and overall
/// completeness. Each issue costs 10/5/2 points by severity off a score of 100.
pub fn assess(raw: &[RawRecord], today: NaiveDate) -> QualityReport {
  let mut issues = Vec::new();

  let dups = duplicate_rows(raw);
  if dups > 0 {
    issues.push(issue(
      IssueKind::DuplicateRecords,
      Severity::High,
      None,
      dups,
      format!("{dups} rows are exact duplicates of another row"),
    ));
  }
  missing_fields(raw, &mut issues);
  date_checks(raw, today, &mut issues);
  hours_checks(raw, &mut issues);

  let (pct, missing, total) = completeness(raw);
  if pct < 95.0 {
    issues.push(issue(
      IssueKind::LowCompleteness,
      if pct < 80.0 { Severity::High } else { Severity::Medium },
      None,
      missing,
      format!("input is {}% complete ({missing} of {total} cells empty)", fmt_value(pct)),
    ));
  }

  let penalty: u32 = issues.iter().map(|i| i.severity.penalty()).sum();
  let score = 100u32.saturating_sub(penalty);
  for i in issues.iter().filter(|i| i.severity == Severity::High) {
    warn!(kind = ?i.kind, count = i.count, "{}", i.description);
  }
  info!(score, issues = issues.len(), completeness = pct, "assessed input quality");

  QualityReport {
    rows: raw.len(),
    completeness: pct,
    score,
    rating: rating(score).to_string(),
    issues,
  }
}
