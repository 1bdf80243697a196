// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Load raw volunteer rows from CSV or JSON exports into RawRecord values
// role: input/adapter
// inputs: A file path; CSV with a header row, or JSON (array of objects, or an object wrapping one under items/results/records)
// outputs: Vec<RawRecord> with every recognised column copied verbatim as text
// invariants: No coercion happens here; header matching is case-insensitive and ignores spaces/underscores/punctuation
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info};

use crate::model::RawRecord;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Column {
  Assignee,
  Branch,
  Category,
  Project,
  Member,
  Hours,
  Date,
}

/// Normalised header name -> column. Exports from the volunteer platform use
/// camelCase (`creditedHours`, `volunteerDate`) while hand-made sheets use titles.
const ALIASES: &[(&str, Column)] = &[
  ("assignee", Column::Assignee),
  ("contact", Column::Assignee),
  ("contactname", Column::Assignee),
  ("volunteer", Column::Assignee),
  ("volunteername", Column::Assignee),
  ("name", Column::Assignee),
  ("branch", Column::Branch),
  ("memberbranch", Column::Branch),
  ("location", Column::Branch),
  ("category", Column::Category),
  ("projecttag", Column::Category),
  ("tag", Column::Category),
  ("project", Column::Project),
  ("projectname", Column::Project),
  ("assignment", Column::Project),
  ("member", Column::Member),
  ("ismember", Column::Member),
  ("ymcamember", Column::Member),
  ("memberstatus", Column::Member),
  ("hours", Column::Hours),
  ("creditedhours", Column::Hours),
  ("duration", Column::Hours),
  ("date", Column::Date),
  ("volunteerdate", Column::Date),
  ("activitydate", Column::Date),
];

fn normalize_header(h: &str) -> String {
  h.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

fn column_for(header: &str) -> Option<Column> {
  let key = normalize_header(header);
  ALIASES.iter().find(|(alias, _)| *alias == key).map(|(_, c)| *c)
}

fn assign(rec: &mut RawRecord, col: Column, value: String) {
  let slot = match col {
    Column::Assignee => &mut rec.assignee,
    Column::Branch => &mut rec.branch,
    Column::Category => &mut rec.category,
    Column::Project => &mut rec.project,
    Column::Member => &mut rec.member,
    Column::Hours => &mut rec.hours,
    Column::Date => &mut rec.date,
  };
  // First matching column wins when a file carries two aliases of the same field.
  if slot.is_none() {
    let trimmed = value.trim();
    if !trimmed.is_empty() {
      *slot = Some(trimmed.to_string());
    }
  }
}

/// Load a record file, choosing the reader from the extension (`.json` or anything else as CSV).
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
  let is_json = path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.eq_ignore_ascii_case("json"))
    .unwrap_or(false);

  let rows = if is_json {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    read_json(&text).with_context(|| format!("parsing JSON records from {}", path.display()))?
  } else {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_csv(file).with_context(|| format!("parsing CSV records from {}", path.display()))?
  };
  info!(path = %path.display(), rows = rows.len(), "loaded input records");
  Ok(rows)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
  let mut rdr = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(reader);
  let headers = rdr.headers().context("reading CSV header row")?.clone();
  let columns: Vec<Option<Column>> = headers.iter().map(column_for).collect();
  for (h, c) in headers.iter().zip(&columns) {
    if c.is_none() {
      debug!(header = h, "ignoring unrecognised column");
    }
  }

  let mut out = Vec::new();
  for (idx, row) in rdr.records().enumerate() {
    let row = row.with_context(|| format!("reading CSV row {}", idx + 2))?;
    let mut rec = RawRecord::default();
    for (value, col) in row.iter().zip(&columns) {
      if let Some(col) = col {
        assign(&mut rec, *col, value.to_string());
      }
    }
    out.push(rec);
  }
  Ok(out)
}

pub fn read_json(text: &str) -> Result<Vec<RawRecord>> {
  let root: Value = serde_json::from_str(text)?;
  let items = match root {
    Value::Array(items) => items,
    Value::Object(mut map) => match ["items", "results", "records", "data"]
      .iter()
      .find_map(|k| map.remove(*k))
    {
      Some(Value::Array(items)) => items,
      _ => bail!("expected an array of records or an object with an items/results/records array"),
    },
    _ => bail!("expected an array of records or an object with an items/results/records array"),
  };

  let mut out = Vec::with_capacity(items.len());
  for (idx, item) in items.into_iter().enumerate() {
    let Value::Object(obj) = item else {
      bail!("record {} is not an object", idx);
    };
    let mut rec = RawRecord::default();
    for (key, value) in obj {
      let Some(col) = column_for(&key) else {
        continue;
      };
      let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => continue,
      };
      assign(&mut rec, col, text);
    }
    out.push(rec);
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn csv_headers_match_aliases() {
    let data = "Contact Name,Branch,PROJECT_TAG,assignment,YMCA Member,creditedHours,volunteerDate,Notes\n\
                Ann,Downtown,Swim,Lifeguard,Yes,2.5,2025-01-10,x\n";
    let rows = read_csv(data.as_bytes()).unwrap();
    assert_eq!(rows.len(), 1);
    let r = &rows[0];
    assert_eq!(r.assignee.as_deref(), Some("Ann"));
    assert_eq!(r.branch.as_deref(), Some("Downtown"));
    assert_eq!(r.category.as_deref(), Some("Swim"));
    assert_eq!(r.project.as_deref(), Some("Lifeguard"));
    assert_eq!(r.member.as_deref(), Some("Yes"));
    assert_eq!(r.hours.as_deref(), Some("2.5"));
    assert_eq!(r.date.as_deref(), Some("2025-01-10"));
  }

  #[test]
  fn blank_cells_stay_absent() {
    let rows = read_csv("branch,hours,date\n,3,2025-01-01\n".as_bytes()).unwrap();
    assert_eq!(rows[0].branch, None);
  }

  #[test]
  fn json_accepts_wrapped_arrays_and_numbers() {
    let text = r#"{"items":[{"branch":"A","hours":5,"date":"2025-01-10","member":true}]}"#;
    let rows = read_json(text).unwrap();
    assert_eq!(rows[0].hours.as_deref(), Some("5"));
    assert_eq!(rows[0].member.as_deref(), Some("true"));
  }

  #[test]
  fn json_rejects_scalars() {
    assert!(read_json("42").is_err());
    assert!(read_json("[1,2]").is_err());
  }
}
