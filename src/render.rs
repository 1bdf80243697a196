use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{ReportTable, SummaryReport, fmt_value, round2};
use crate::util::{archive_stamp, artifact_stamp};

pub const ARCHIVE_DIR: &str = "archive";

/// Column-oriented form of a table: column name -> values, plus the row order
/// (group keys in report order) so any exporter can rebuild rows losslessly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableExport {
  pub id: String,
  pub title: String,
  pub columns: Vec<String>,
  pub values: BTreeMap<String, Vec<Value>>,
  pub row_order: Vec<String>,
}

pub fn export_table(t: &ReportTable) -> TableExport {
  let keys: Vec<Value> = t.rows.iter().map(|r| Value::from(r.key.clone())).collect();
  let vals: Vec<Value> = t.rows.iter().map(|r| Value::from(round2(r.value))).collect();
  let mut values = BTreeMap::new();
  values.insert(t.key_column.clone(), keys);
  values.insert(t.value_column.clone(), vals);
  TableExport {
    id: t.id.clone(),
    title: t.title.clone(),
    columns: vec![t.key_column.clone(), t.value_column.clone()],
    values,
    row_order: t.rows.iter().map(|r| r.key.clone()).collect(),
  }
}

/// JSON document written per page: the report plus every table in export form.
#[derive(Debug, Serialize)]
pub struct PageDocument<'a> {
  #[serde(flatten)]
  pub report: &'a SummaryReport,
  pub exports: Vec<TableExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
  pub kind: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub table: Option<String>,
  /// Relative to the output directory.
  pub file: String,
}

/// Copy an existing destination into `<dir>/archive/<stem>_<stamp>.<ext>`.
///
/// Failures are logged and reported as `None`; the caller still writes the destination.
pub fn backup_existing(dest: &Path, out_dir: &Path, now: DateTime<Local>) -> Option<PathBuf> {
  if !dest.exists() {
    return None;
  }
  let stem = dest.file_stem().and_then(|s| s.to_str()).unwrap_or("artifact");
  let ext = dest.extension().and_then(|e| e.to_str());
  let stamp = archive_stamp(now);
  let archive = out_dir.join(ARCHIVE_DIR);

  // Several backups within one second get _1, _2, ... suffixes instead of overwriting.
  let named = |n: u32| {
    let base = if n == 0 { format!("{stem}_{stamp}") } else { format!("{stem}_{stamp}_{n}") };
    match ext {
      Some(ext) => archive.join(format!("{base}.{ext}")),
      None => archive.join(base),
    }
  };
  let mut n = 0;
  let mut target = named(n);
  while target.exists() {
    n += 1;
    target = named(n);
  }

  let result = fs::create_dir_all(&archive).and_then(|_| fs::copy(dest, &target));
  match result {
    Ok(_) => {
      info!(from = %dest.display(), to = %target.display(), "backed up existing file");
      Some(target)
    }
    Err(e) => {
      warn!(path = %dest.display(), error = %e, "backup failed; overwriting anyway");
      None
    }
  }
}

/// Write `bytes` to `out_dir/name`, archiving any previous file of that name first.
pub fn write_artifact(out_dir: &Path, name: &str, bytes: &[u8], now: DateTime<Local>) -> Result<PathBuf> {
  let dest = out_dir.join(name);
  backup_existing(&dest, out_dir, now);
  fs::write(&dest, bytes).with_context(|| format!("writing {}", dest.display()))?;
  debug!(path = %dest.display(), bytes = bytes.len(), "wrote artifact");
  Ok(dest)
}

pub fn table_csv(t: &ReportTable) -> Result<Vec<u8>> {
  let export = export_table(t);
  let mut wtr = csv::Writer::from_writer(Vec::new());
  wtr.write_record(&export.columns)?;
  for row in &t.rows {
    wtr.write_record([row.key.as_str(), &fmt_value(row.value)])?;
  }
  wtr.flush()?;
  Ok(wtr.into_inner().map_err(|e| anyhow::anyhow!("finishing CSV buffer: {}", e))?)
}

/// Write every artifact of one page and return them in write order.
pub fn write_page(report: &SummaryReport, out_dir: &Path, now: DateTime<Local>) -> Result<Vec<Artifact>> {
  let stamp = artifact_stamp(now);
  let mut written = Vec::new();

  for t in &report.tables {
    let name = format!("{}_{}_{}.csv", report.page, t.id, stamp);
    write_artifact(out_dir, &name, &table_csv(t)?, now)?;
    written.push(Artifact {
      kind: "table".into(),
      table: Some(t.id.clone()),
      file: name,
    });
  }

  let doc = PageDocument {
    report,
    exports: report.tables.iter().map(export_table).collect(),
  };
  let json_name = format!("{}_{}.json", report.page, stamp);
  write_artifact(out_dir, &json_name, &serde_json::to_vec_pretty(&doc)?, now)?;
  written.push(Artifact {
    kind: "report".into(),
    table: None,
    file: json_name,
  });

  let txt_name = format!("{}_summary_{}.txt", report.page, stamp);
  write_artifact(out_dir, &txt_name, report.narrative.as_bytes(), now)?;
  written.push(Artifact {
    kind: "summary".into(),
    table: None,
    file: txt_name,
  });

  info!(page = %report.page, files = written.len(), dir = %out_dir.display(), "wrote page artifacts");
  Ok(written)
}
