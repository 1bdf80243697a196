// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Apply manual adjustments to aggregated tables and compose them into a SummaryReport with narrative text
// role: assembly/core
// inputs: Page tables, per-page adjustment table, resolved DateRange, AssembleOptions
// outputs: SummaryReport (tables incl. summary, overrides, warnings, notes, comparison, narrative)
// invariants: Adjustments run exactly once, after aggregation; every replaced value is disclosed as an Override
// errors: AdjustmentKeyNotFound only in strict mode; otherwise unmatched keys become warnings
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::config::AdjustmentTable;
use crate::errors::{ReportError, ReportResult};
use crate::model::{
  ComparisonRow, DateRange, Override, PeriodInfo, ReportTable, SummaryReport, TableRow, fmt_value, sort_rows,
};
use crate::range_windows::{describe_period, format_iso, range_type};

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
  pub strict_adjustments: bool,
  pub top_n: usize,
  pub generated_at: String,
  /// Number of records inside the period, reported in the summary table.
  pub record_count: usize,
  pub warnings: Vec<String>,
  pub notes: Vec<String>,
  pub previous_period: Option<PeriodInfo>,
  pub comparison: Vec<ComparisonRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Adjusted {
  pub tables: Vec<ReportTable>,
  pub overrides: Vec<Override>,
  pub warnings: Vec<String>,
}

pub fn period_info(range: &DateRange) -> PeriodInfo {
  PeriodInfo {
    start: range.start,
    end: range.end,
    label: range.label.clone(),
    description: describe_period(range),
    range_type: range_type(range.day_count()).to_string(),
    days: range.day_count(),
  }
}

fn unmatched(table: &str, key: &str, present: &[TableRow], strict: bool) -> ReportResult<String> {
  let present = if present.is_empty() {
    "(none)".to_string()
  } else {
    present.iter().map(|r| r.key.as_str()).collect::<Vec<_>>().join(", ")
  };
  let err = ReportError::AdjustmentKeyNotFound {
    table: table.to_string(),
    key: key.to_string(),
    present,
  };
  if strict {
    return Err(err);
  }
  warn!(table, key, "adjustment skipped: no matching group");
  Ok(format!("skipped {err}"))
}

/// Replace aggregated values with configured ones and re-order the touched tables.
///
/// Adjustments naming a table or group that is not present are skipped with a warning,
/// or fail with `AdjustmentKeyNotFound` when `strict` is set.
pub fn apply_adjustments(
  tables: Vec<ReportTable>,
  adjustments: &AdjustmentTable,
  strict: bool,
) -> ReportResult<Adjusted> {
  let mut tables = tables;
  let mut overrides = Vec::new();
  let mut warnings = Vec::new();

  for (table_id, values) in adjustments {
    let Some(table) = tables.iter_mut().find(|t| &t.id == table_id) else {
      for key in values.keys() {
        warnings.push(unmatched(table_id, key, &[], strict)?);
      }
      continue;
    };
    for (key, new) in values {
      match table.rows.iter_mut().find(|r| &r.key == key) {
        Some(row) => {
          info!(table = %table_id, key = %key, old = row.value, new, "applied adjustment");
          overrides.push(Override {
            table: table_id.clone(),
            key: key.clone(),
            old: row.value,
            new: *new,
          });
          row.value = *new;
        }
        None => warnings.push(unmatched(table_id, key, &table.rows, strict)?),
      }
    }
    sort_rows(&mut table.rows);
  }

  Ok(Adjusted {
    tables,
    overrides,
    warnings,
  })
}

fn summary_label(t: &ReportTable) -> String {
  if t.value_column.starts_with("Total") {
    t.value_column.clone()
  } else {
    format!("Total {}", t.value_column)
  }
}

/// Metric name -> total, one row per table, in page order.
pub fn summary_table(tables: &[ReportTable], record_count: usize) -> ReportTable {
  let mut rows = vec![TableRow {
    key: "Records in Period".into(),
    value: record_count as f64,
  }];
  rows.extend(tables.iter().map(|t| TableRow {
    key: summary_label(t),
    value: t.total(),
  }));
  ReportTable {
    id: "summary".into(),
    title: "Summary".into(),
    key_column: "Metric".into(),
    value_column: "Value".into(),
    rows,
  }
}

/// Compose one page's tables into a `SummaryReport`.
pub fn assemble(
  page_id: &str,
  title: &str,
  tables: Vec<ReportTable>,
  adjustments: &AdjustmentTable,
  period: &DateRange,
  opts: AssembleOptions,
) -> ReportResult<SummaryReport> {
  let adjusted = apply_adjustments(tables, adjustments, opts.strict_adjustments)?;

  let mut tables = adjusted.tables;
  tables.push(summary_table(&tables, opts.record_count));

  let mut warnings = period.warnings.clone();
  warnings.extend(opts.warnings);
  warnings.extend(adjusted.warnings);

  let mut report = SummaryReport {
    page: page_id.to_string(),
    title: title.to_string(),
    generated_at: opts.generated_at,
    period: period_info(period),
    tables,
    overrides: adjusted.overrides,
    warnings,
    notes: opts.notes,
    previous_period: opts.previous_period,
    comparison: opts.comparison,
    narrative: String::new(),
  };
  report.narrative = narrative(&report, opts.top_n);
  Ok(report)
}

fn signed(v: f64) -> String {
  if v >= 0.0 {
    format!("+{}", fmt_value(v))
  } else {
    fmt_value(v)
  }
}

/// Plain-text rendering of a report: period, per-table totals and top entries,
/// then overrides, comparison, data notes and warnings when present.
pub fn narrative(report: &SummaryReport, top_n: usize) -> String {
  let p = &report.period;
  let mut out = String::new();
  let _ = writeln!(out, "{}", report.title);
  let _ = writeln!(
    out,
    "Period: {} ({} to {}, {} days, {})",
    p.description,
    format_iso(p.start),
    format_iso(p.end),
    p.days,
    p.range_type
  );
  if let Some(label) = &p.label {
    let _ = writeln!(out, "Selection: {label}");
  }

  for t in report.tables.iter().filter(|t| t.id != "summary") {
    let _ = writeln!(out);
    if t.is_empty() {
      let _ = writeln!(out, "{}: no activity in this period", t.title);
      continue;
    }
    let _ = writeln!(
      out,
      "{}: {} {} across {} {}",
      t.title,
      fmt_value(t.total()),
      t.value_column.to_lowercase(),
      t.rows.len(),
      if t.rows.len() == 1 { "group" } else { "groups" }
    );
    let _ = writeln!(out, "  Top {}:", top_n.min(t.rows.len()));
    for (i, row) in t.top(top_n).iter().enumerate() {
      let _ = writeln!(out, "    {}. {}: {}", i + 1, row.key, fmt_value(row.value));
    }
  }

  if !report.overrides.is_empty() {
    let _ = writeln!(out, "\nManual adjustments:");
    for o in &report.overrides {
      let _ = writeln!(out, "  - {} / {}: {} -> {}", o.table, o.key, fmt_value(o.old), fmt_value(o.new));
    }
  }

  if !report.comparison.is_empty() {
    let _ = write!(out, "\nCompared with previous period");
    if let Some(prev) = &report.previous_period {
      let _ = write!(out, " ({})", prev.description);
    }
    let _ = writeln!(out, ":");
    for c in &report.comparison {
      let pct = c
        .change_percentage
        .map(|v| format!("{}%", signed((v * 10.0).round() / 10.0)))
        .unwrap_or_else(|| "n/a".into());
      let flag = c.significance.as_deref().map(|s| format!(" [{s}]")).unwrap_or_default();
      let _ = writeln!(
        out,
        "  - {}: {} -> {} ({}, {}){}",
        c.table,
        fmt_value(c.previous),
        fmt_value(c.current),
        signed(c.change_absolute),
        pct,
        flag
      );
    }
  }

  if !report.notes.is_empty() {
    let _ = writeln!(out, "\nData notes:");
    for n in &report.notes {
      let _ = writeln!(out, "  - {n}");
    }
  }

  if !report.warnings.is_empty() {
    let _ = writeln!(out, "\nWarnings:");
    for w in &report.warnings {
      let _ = writeln!(out, "  - {w}");
    }
  }
  out
}
