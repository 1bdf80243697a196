use chrono::{Datelike, Duration};

use crate::model::{ComparisonRow, DateRange, ReportTable};
use crate::range_windows::shift_months;

const SIGNIFICANT_PCT: f64 = 10.0;
const HIGH_PCT: f64 = 25.0;

/// The period immediately before `range`.
///
/// Whole calendar months, quarters and years step back by the same calendar unit;
/// anything else steps back by the same number of days.
pub fn previous_period(range: &DateRange) -> DateRange {
  let (start, end) = (range.start, range.end);
  let next_day = end.succ_opt().unwrap_or(end);
  let whole_months = start.day() == 1 && next_day.day() == 1;
  if whole_months {
    let months = (next_day.year() - start.year()) * 12 + next_day.month() as i32 - start.month() as i32;
    if let Some(prev_start) = shift_months(start, -months) {
      let prev_end = start.pred_opt().unwrap_or(start);
      return DateRange::labeled(prev_start, prev_end, "Previous Period");
    }
  }
  let prev_end = start - Duration::days(1);
  let prev_start = prev_end - Duration::days(range.span_days());
  DateRange::labeled(prev_start, prev_end, "Previous Period")
}

pub fn significance(change_pct: Option<f64>) -> Option<String> {
  let pct = change_pct?.abs();
  if pct >= HIGH_PCT {
    Some("HIGH".into())
  } else if pct >= SIGNIFICANT_PCT {
    Some("MEDIUM".into())
  } else {
    None
  }
}

/// Compare table totals by id. Tables missing from `previous` compare against zero.
pub fn compare_totals(current: &[ReportTable], previous: &[ReportTable]) -> Vec<ComparisonRow> {
  current
    .iter()
    .map(|t| {
      let cur = t.total();
      let prev = previous.iter().find(|p| p.id == t.id).map(ReportTable::total).unwrap_or(0.0);
      let pct = (prev != 0.0).then(|| (cur - prev) / prev * 100.0);
      ComparisonRow {
        table: t.id.clone(),
        current: cur,
        previous: prev,
        change_absolute: cur - prev,
        change_percentage: pct,
        significance: significance(pct),
      }
    })
    .collect()
}
