use std::collections::HashMap;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::KeepPolicy;
use crate::errors::{ReportError, ReportResult};
use crate::model::{Field, RawRecord, Record, RecordSet};
use crate::range_windows::parse_absolute;

/// Key under which records collapse to a single representative.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DedupeStrategy {
  #[default]
  None,
  AssigneeCategoryBranch,
  AssigneeBranch,
}

impl DedupeStrategy {
  pub fn key_fields(self) -> &'static [Field] {
    match self {
      DedupeStrategy::None => &[],
      DedupeStrategy::AssigneeCategoryBranch => &[Field::Assignee, Field::Category, Field::Branch],
      DedupeStrategy::AssigneeBranch => &[Field::Assignee, Field::Branch],
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
  pub rows_loaded: usize,
  pub dropped_zero_hours: usize,
  pub skipped_invalid: usize,
  /// Rows dated after the reference day (only when future dates are not allowed).
  pub dropped_future: usize,
  pub removed_duplicates: usize,
  pub rows_kept: usize,
}

/// Everything `clean` needs besides the rows themselves.
#[derive(Debug, Clone, Copy)]
pub struct CleanOptions {
  pub dedupe: DedupeStrategy,
  pub keep: KeepPolicy,
  /// Reference day; rows dated after it are dropped unless `allow_future` is set.
  pub today: NaiveDate,
  pub allow_future: bool,
}

#[derive(Debug, Clone)]
pub struct Cleaned {
  pub records: RecordSet,
  pub stats: CleaningStats,
  pub warnings: Vec<String>,
}

/// Collapse records sharing the strategy's key to one representative.
///
/// Records missing any key attribute cannot be matched reliably and are kept as they are.
/// Output order follows input order of the surviving representatives.
pub fn dedupe(records: &[Record], strategy: DedupeStrategy, keep: KeepPolicy) -> Vec<Record> {
  let fields = strategy.key_fields();
  if fields.is_empty() {
    return records.to_vec();
  }

  let key_of = |r: &Record| -> Option<Vec<String>> {
    fields.iter().map(|f| r.field(*f).map(str::to_string)).collect()
  };

  // key -> index of the chosen representative
  let mut chosen: HashMap<Vec<String>, usize> = HashMap::new();
  for (idx, r) in records.iter().enumerate() {
    if let Some(key) = key_of(r) {
      match keep {
        KeepPolicy::First => {
          chosen.entry(key).or_insert(idx);
        }
        KeepPolicy::Last => {
          chosen.insert(key, idx);
        }
      }
    }
  }

  records
    .iter()
    .enumerate()
    .filter(|(idx, r)| match key_of(r) {
      Some(key) => chosen.get(&key) == Some(idx),
      None => true,
    })
    .map(|(_, r)| r.clone())
    .collect()
}

fn parse_hours(text: &str) -> Option<f64> {
  let v: f64 = text.trim().parse().ok()?;
  (v.is_finite() && v >= 0.0).then_some(v)
}

fn parse_member(text: &str) -> Option<bool> {
  match text.trim().to_ascii_lowercase().as_str() {
    "yes" | "y" | "true" | "1" | "member" => Some(true),
    "no" | "n" | "false" | "0" | "non-member" | "nonmember" => Some(false),
    _ => None,
  }
}

fn coerce(raw: &RawRecord) -> Option<(f64, NaiveDate)> {
  let hours = parse_hours(raw.hours.as_deref()?)?;
  let date = parse_absolute(raw.date.as_deref()?)?;
  Some((hours, date))
}

/// Turn raw rows into the canonical record set.
///
/// Zero-hour rows are dropped, and so are rows dated after `opts.today` unless future
/// dates are allowed. Rows whose hours or date cannot be coerced are skipped and counted.
/// Fails only when the input is empty or no row carries the required fields at all.
pub fn clean(raw: &[RawRecord], origin: &str, opts: &CleanOptions) -> ReportResult<Cleaned> {
  if raw.is_empty() {
    return Err(ReportError::Validation(format!("'{origin}' contains no records")));
  }
  let missing: Vec<&str> = [
    ("hours", raw.iter().all(|r| r.hours.is_none())),
    ("date", raw.iter().all(|r| r.date.is_none())),
  ]
  .into_iter()
  .filter_map(|(name, absent)| absent.then_some(name))
  .collect();
  if !missing.is_empty() {
    return Err(ReportError::Validation(format!(
      "'{}' has no usable {} column; expected headers such as hours/creditedHours and date/volunteerDate",
      origin,
      missing.join(" or ")
    )));
  }

  let mut stats = CleaningStats {
    rows_loaded: raw.len(),
    ..Default::default()
  };
  let mut kept = Vec::with_capacity(raw.len());
  for (idx, r) in raw.iter().enumerate() {
    let Some((hours, date)) = coerce(r) else {
      debug!(row = idx, hours = ?r.hours, date = ?r.date, "skipping row with unusable hours/date");
      stats.skipped_invalid += 1;
      continue;
    };
    if hours == 0.0 {
      stats.dropped_zero_hours += 1;
      continue;
    }
    if !opts.allow_future && date > opts.today {
      debug!(row = idx, %date, "dropping future-dated row");
      stats.dropped_future += 1;
      continue;
    }
    kept.push(Record {
      assignee: r.assignee.clone(),
      branch: r.branch.clone(),
      category: r.category.clone(),
      project: r.project.clone(),
      member: r.member.as_deref().and_then(parse_member),
      hours,
      date,
    });
  }

  let before = kept.len();
  let kept = dedupe(&kept, opts.dedupe, opts.keep);
  stats.removed_duplicates = before - kept.len();
  stats.rows_kept = kept.len();

  let mut warnings = Vec::new();
  if stats.skipped_invalid > 0 {
    warnings.push(format!(
      "{} of {} rows skipped: hours or date missing or unparseable",
      stats.skipped_invalid, stats.rows_loaded
    ));
    warn!(skipped = stats.skipped_invalid, "rows skipped during cleaning");
  }
  if stats.dropped_future > 0 {
    warnings.push(format!(
      "{} of {} rows dated after {} dropped; pass --allow-future to keep them",
      stats.dropped_future,
      stats.rows_loaded,
      opts.today.format("%Y-%m-%d")
    ));
    warn!(dropped = stats.dropped_future, "future-dated rows dropped during cleaning");
  }
  info!(
    loaded = stats.rows_loaded,
    zero_hours = stats.dropped_zero_hours,
    skipped = stats.skipped_invalid,
    future = stats.dropped_future,
    duplicates = stats.removed_duplicates,
    kept = stats.rows_kept,
    "cleaned records"
  );

  Ok(Cleaned {
    records: RecordSet::new(origin, kept),
    stats,
    warnings,
  })
}
