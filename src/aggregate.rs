// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Group a windowed record set by an attribute or keyword classifier and compute one metric per group
// role: aggregation/core
// inputs: RecordSet already filtered to the active range, GroupBy, Metric, table-level dedupe strategy, keep policy
// outputs: Sparse group -> value map plus warnings about rows left out for lack of a grouping value
// invariants: Groups with no contributing record never appear; output depends only on inputs (repeat calls agree)
// errors: UnknownGroupKey when the attribute name is unknown or absent from every record
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clean::{DedupeStrategy, dedupe};
use crate::config::KeepPolicy;
use crate::errors::{ReportError, ReportResult};
use crate::model::{Field, Record, RecordSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
  /// Group by the raw value of one attribute.
  Field(String),
  /// Group by the label of the first keyword rule that matches.
  Classify(Classifier),
}

/// Ordered keyword rules over one or more attributes. Matching is a case-insensitive
/// substring test; the first rule that matches decides the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
  pub fields: Vec<String>,
  pub rules: Vec<ClassRule>,
  /// Label for records no rule matches; `None` leaves them out of the table.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRule {
  pub label: String,
  pub contains: Vec<String>,
  /// Inspect these attributes instead of the classifier's.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
  /// Sum of hours.
  Hours,
  /// Number of records left after the table's dedupe.
  Records,
  /// Number of distinct values of an attribute.
  Distinct(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregated {
  pub groups: BTreeMap<String, f64>,
  pub excluded: usize,
  pub warnings: Vec<String>,
}

struct CompiledRule {
  label: String,
  needles: Vec<String>,
  fields: Vec<Field>,
}

enum Grouping {
  Field(Field),
  Classify {
    rules: Vec<CompiledRule>,
    fallback: Option<String>,
  },
}

impl Grouping {
  fn key(&self, r: &Record) -> Option<String> {
    match self {
      Grouping::Field(f) => r.field(*f).map(str::to_string),
      Grouping::Classify { rules, fallback } => rules
        .iter()
        .find(|rule| {
          rule.fields.iter().filter_map(|f| r.field(*f)).any(|value| {
            let value = value.to_lowercase();
            rule.needles.iter().any(|n| value.contains(n.as_str()))
          })
        })
        .map(|rule| rule.label.clone())
        .or_else(|| fallback.clone()),
    }
  }
}

fn parse_fields(names: &[String]) -> ReportResult<Vec<Field>> {
  names.iter().map(|n| n.parse::<Field>()).collect()
}

/// Fail unless at least one record carries one of `fields`.
fn require_present(records: &RecordSet, fields: &[Field], key: &str) -> ReportResult<()> {
  if records.is_empty() || records.records().iter().any(|r| fields.iter().any(|f| r.field(*f).is_some())) {
    return Ok(());
  }
  let present: Vec<&str> = Field::ALL
    .iter()
    .filter(|f| records.records().iter().any(|r| r.field(**f).is_some()))
    .map(|f| f.name())
    .collect();
  Err(ReportError::UnknownGroupKey {
    key: key.to_string(),
    expected: if present.is_empty() {
      "an attribute carried by at least one record (none present)".to_string()
    } else {
      format!("an attribute carried by at least one record: {}", present.join(", "))
    },
  })
}

fn compile(group_by: &GroupBy, records: &RecordSet) -> ReportResult<Grouping> {
  match group_by {
    GroupBy::Field(name) => {
      let field: Field = name.parse()?;
      require_present(records, &[field], name)?;
      Ok(Grouping::Field(field))
    }
    GroupBy::Classify(c) => {
      let base = parse_fields(&c.fields)?;
      let mut all = base.clone();
      let mut rules = Vec::with_capacity(c.rules.len());
      for rule in &c.rules {
        let fields = match &rule.fields {
          Some(names) => parse_fields(names)?,
          None => base.clone(),
        };
        all.extend(fields.iter().copied());
        rules.push(CompiledRule {
          label: rule.label.clone(),
          needles: rule.contains.iter().map(|s| s.to_lowercase()).collect(),
          fields,
        });
      }
      require_present(records, &all, &c.fields.join("+"))?;
      Ok(Grouping::Classify {
        rules,
        fallback: c.fallback.clone(),
      })
    }
  }
}

/// Group `records` and compute `metric` per group.
///
/// `records` is expected to be windowed already. The table-level `dedupe` runs first,
/// so `Metric::Records` under `AssigneeBranch` counts active volunteers per branch.
pub fn aggregate(
  records: &RecordSet,
  group_by: &GroupBy,
  metric: &Metric,
  dedupe_strategy: DedupeStrategy,
  keep: KeepPolicy,
) -> ReportResult<Aggregated> {
  let grouping = compile(group_by, records)?;
  let distinct_field = match metric {
    Metric::Distinct(name) => {
      let f: Field = name.parse()?;
      require_present(records, &[f], name)?;
      Some(f)
    }
    _ => None,
  };

  let rows = dedupe(records.records(), dedupe_strategy, keep);

  let mut sums: BTreeMap<String, f64> = BTreeMap::new();
  let mut distinct: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  let mut excluded = 0usize;

  for r in &rows {
    let Some(key) = grouping.key(r) else {
      excluded += 1;
      continue;
    };
    match metric {
      Metric::Hours => *sums.entry(key).or_insert(0.0) += r.hours,
      Metric::Records => *sums.entry(key).or_insert(0.0) += 1.0,
      Metric::Distinct(_) => {
        if let Some(v) = distinct_field.and_then(|f| r.field(f)) {
          distinct.entry(key).or_default().insert(v.to_string());
        }
      }
    }
  }

  if matches!(metric, Metric::Distinct(_)) {
    sums = distinct.into_iter().map(|(k, set)| (k, set.len() as f64)).collect();
  }

  let mut warnings = Vec::new();
  if excluded > 0 {
    match &grouping {
      Grouping::Field(field) => warnings.push(format!(
        "{excluded} of {} records have no {field} value and were left out",
        rows.len()
      )),
      _ => debug!(excluded, "records matched no classifier rule"),
    }
  }
  debug!(groups = sums.len(), rows = rows.len(), "aggregated");

  Ok(Aggregated {
    groups: sums,
    excluded,
    warnings,
  })
}
