// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Define the record, range, table and summary types shared by every pipeline stage
// role: model/types
// outputs: Serializable structs with stable field names
// invariants: RecordSet and ReportTable are never mutated after construction; table rows are ordered by value desc then key asc
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::ReportError;

/// One row as it arrived from the input file, before any coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawRecord {
  pub assignee: Option<String>,
  pub branch: Option<String>,
  pub category: Option<String>,
  pub project: Option<String>,
  pub member: Option<String>,
  pub hours: Option<String>,
  pub date: Option<String>,
}

/// One volunteer activity entry in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub assignee: Option<String>,
  pub branch: Option<String>,
  pub category: Option<String>,
  pub project: Option<String>,
  pub member: Option<bool>,
  pub hours: f64,
  pub date: NaiveDate,
}

impl Record {
  /// Value of a categorical attribute, `None` when the row does not carry it.
  pub fn field(&self, field: Field) -> Option<&str> {
    match field {
      Field::Assignee => self.assignee.as_deref(),
      Field::Branch => self.branch.as_deref(),
      Field::Category => self.category.as_deref(),
      Field::Project => self.project.as_deref(),
      Field::Member => self.member.map(|m| if m { "Yes" } else { "No" }),
    }
  }
}

/// Categorical record attributes usable as grouping dimensions and dedupe keys.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
  Assignee,
  Branch,
  Category,
  Project,
  Member,
}

impl Field {
  pub const ALL: [Field; 5] = [
    Field::Assignee,
    Field::Branch,
    Field::Category,
    Field::Project,
    Field::Member,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Field::Assignee => "assignee",
      Field::Branch => "branch",
      Field::Category => "category",
      Field::Project => "project",
      Field::Member => "member",
    }
  }

  pub fn expected_names() -> String {
    Field::ALL.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
  }
}

impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Field {
  type Err = ReportError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let key = s.trim().to_ascii_lowercase();
    Field::ALL
      .iter()
      .copied()
      .find(|f| f.name() == key)
      .ok_or_else(|| ReportError::UnknownGroupKey {
        key: s.to_string(),
        expected: Field::expected_names(),
      })
  }
}

/// Immutable collection of canonical records sharing one origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSet {
  origin: String,
  records: Vec<Record>,
}

impl RecordSet {
  pub fn new(origin: impl Into<String>, records: Vec<Record>) -> Self {
    Self {
      origin: origin.into(),
      records,
    }
  }

  pub fn origin(&self) -> &str {
    &self.origin
  }

  pub fn records(&self) -> &[Record] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// New set holding only the records whose date falls inside `range` (inclusive).
  pub fn within(&self, range: &DateRange) -> RecordSet {
    let records = self
      .records
      .iter()
      .filter(|r| range.contains(r.date))
      .cloned()
      .collect();
    RecordSet::new(self.origin.clone(), records)
  }

  /// Earliest and latest activity date present in the set.
  pub fn coverage(&self) -> Option<(NaiveDate, NaiveDate)> {
    let min = self.records.iter().map(|r| r.date).min()?;
    let max = self.records.iter().map(|r| r.date).max()?;
    Some((min, max))
  }

  pub fn total_hours(&self) -> f64 {
    self.records.iter().map(|r| r.hours).sum()
  }
}

/// Inclusive calendar interval with an optional human label and advisory warnings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
    Self {
      start,
      end,
      label: None,
      warnings: Vec::new(),
    }
  }

  pub fn labeled(start: NaiveDate, end: NaiveDate, label: impl Into<String>) -> Self {
    Self {
      label: Some(label.into()),
      ..Self::new(start, end)
    }
  }

  /// `end - start` in days.
  pub fn span_days(&self) -> i64 {
    (self.end - self.start).num_days()
  }

  /// Number of calendar days covered, both ends included.
  pub fn day_count(&self) -> i64 {
    self.span_days() + 1
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
  pub key: String,
  pub value: f64,
}

/// Aggregated metric values keyed by group, in report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
  pub id: String,
  pub title: String,
  pub key_column: String,
  pub value_column: String,
  pub rows: Vec<TableRow>,
}

impl ReportTable {
  pub fn from_groups(
    id: impl Into<String>,
    title: impl Into<String>,
    key_column: impl Into<String>,
    value_column: impl Into<String>,
    groups: BTreeMap<String, f64>,
  ) -> Self {
    let mut rows: Vec<TableRow> = groups
      .into_iter()
      .map(|(key, value)| TableRow { key, value: round2(value) })
      .collect();
    sort_rows(&mut rows);
    Self {
      id: id.into(),
      title: title.into(),
      key_column: key_column.into(),
      value_column: value_column.into(),
      rows,
    }
  }

  pub fn get(&self, key: &str) -> Option<f64> {
    self.rows.iter().find(|r| r.key == key).map(|r| r.value)
  }

  pub fn total(&self) -> f64 {
    round2(self.rows.iter().map(|r| r.value).sum())
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// First `n` rows; rows are already ordered by value desc with ties broken by key asc.
  pub fn top(&self, n: usize) -> &[TableRow] {
    &self.rows[..n.min(self.rows.len())]
  }
}

/// Deterministic, locale-neutral row order: value descending, then key ascending.
pub fn sort_rows(rows: &mut [TableRow]) {
  rows.sort_by(|a, b| match b.value.total_cmp(&a.value) {
    Ordering::Equal => a.key.cmp(&b.key),
    other => other,
  });
}

/// A manual adjustment that actually replaced an aggregated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
  pub table: String,
  pub key: String,
  pub old: f64,
  pub new: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodInfo {
  pub start: NaiveDate,
  pub end: NaiveDate,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  pub description: String,
  pub range_type: String,
  pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
  pub table: String,
  pub current: f64,
  pub previous: f64,
  pub change_absolute: f64,
  /// `None` when the previous value is zero.
  pub change_percentage: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub significance: Option<String>,
}

/// Composed output of one page run: tables, overrides, warnings and narrative text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
  pub page: String,
  pub title: String,
  pub generated_at: String,
  pub period: PeriodInfo,
  pub tables: Vec<ReportTable>,
  pub overrides: Vec<Override>,
  pub warnings: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub notes: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub previous_period: Option<PeriodInfo>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub comparison: Vec<ComparisonRow>,
  pub narrative: String,
}

impl SummaryReport {
  pub fn table(&self, id: &str) -> Option<&ReportTable> {
    self.tables.iter().find(|t| t.id == id)
  }
}

/// Render a metric value for humans: integers stay integral, other values keep two decimals at most.
/// Round to cents so summed shifts don't leak float noise into exports.
pub fn round2(v: f64) -> f64 {
  (v * 100.0).round() / 100.0
}

pub fn fmt_value(v: f64) -> String {
  if v.fract() == 0.0 && v.abs() < 1e15 {
    return format!("{}", v as i64);
  }
  let s = format!("{:.2}", v);
  s.trim_end_matches('0').trim_end_matches('.').to_string()
}
