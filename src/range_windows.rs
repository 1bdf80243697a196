use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Weekday};
use chrono_english::{Interval, parse_duration};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use two_timer::{Config as PhraseConfig, parse as parse_natural};

use crate::errors::{ReportError, ReportResult};
use crate::model::DateRange;

// Date parsing, presets and range validation live here to keep main focused.

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum WindowSpec {
  StartEnd { start: String, end: String },
  Preset { name: String },
  ForPhrase { phrase: String },
  Month { ym: String },
  AllData,
}

static RELATIVE_AGO: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^(\d+)\s+(day|week|month|year)s?\s+ago$").expect("relative date regex"));
// Years beyond 4 digits or before year 0 carry an explicit sign, as chrono formats them.
static NUMERIC_SHAPE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^(?:[+-]\d{1,6}|\d{1,4})[-/]\d{1,2}(?:[-/]\d{1,4})?$").expect("numeric date regex")
});
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("year-month regex"));
static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{4})$").expect("month/year regex"));
static LAST_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^last\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)$").expect("weekday regex")
});

/// Numeric formats in precedence order: ISO family, then US, then European.
///
/// `01/02/2025` is therefore January 2nd; European reading only applies when the
/// US reading is not a valid date (e.g. `15/01/2025`).
const NUMERIC_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y"];

const WRITTEN_FORMATS: [&str; 3] = ["%B %d, %Y", "%b %d, %Y", "%B %d %Y"];

pub fn format_iso(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

/// Parse a date expression relative to `today`.
///
/// Numeric text that looks like a date but names an impossible day fails with
/// `DateFormat`; anything unrecognised fails with `DateParse`.
pub fn parse_date(text: &str, today: NaiveDate) -> ReportResult<NaiveDate> {
  let input = text.trim();
  if input.is_empty() {
    return Err(ReportError::DateParse { input: text.to_string() });
  }

  if NUMERIC_SHAPE.is_match(input) {
    for fmt in NUMERIC_FORMATS {
      if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
        debug!(input, fmt, "parsed absolute date");
        return Ok(d);
      }
    }
    if let Some(d) = parse_year_month(input)? {
      return Ok(d);
    }
    return Err(ReportError::DateFormat {
      input: input.to_string(),
      reason: numeric_failure_reason(input),
    });
  }

  for fmt in WRITTEN_FORMATS {
    if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
      return Ok(d);
    }
  }

  parse_relative(input, today).ok_or_else(|| ReportError::DateParse { input: input.to_string() })
}

/// Absolute dates only, as found in data files. A trailing time part
/// (`2025-01-10T09:30:00Z`, `2025-01-10 09:30`) is ignored.
pub fn parse_absolute(text: &str) -> Option<NaiveDate> {
  let input = text.trim();
  let input = match input.char_indices().nth(10) {
    Some((idx, 'T' | ' ')) if input.as_bytes()[4] == b'-' => &input[..idx],
    _ => input,
  };
  NUMERIC_FORMATS
    .iter()
    .chain(WRITTEN_FORMATS.iter())
    .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

fn parse_year_month(input: &str) -> ReportResult<Option<NaiveDate>> {
  let caps = YEAR_MONTH
    .captures(input)
    .map(|c| (c[1].to_string(), c[2].to_string()))
    .or_else(|| MONTH_YEAR.captures(input).map(|c| (c[2].to_string(), c[1].to_string())));

  let Some((y, m)) = caps else {
    return Ok(None);
  };
  let year: i32 = y.parse().map_err(|_| ReportError::DateParse { input: input.to_string() })?;
  let month: u32 = m.parse().map_err(|_| ReportError::DateParse { input: input.to_string() })?;
  match NaiveDate::from_ymd_opt(year, month, 1) {
    Some(d) => Ok(Some(d)),
    None => Err(ReportError::DateFormat {
      input: input.to_string(),
      reason: format!("month {month} out of range"),
    }),
  }
}

fn numeric_failure_reason(input: &str) -> String {
  let signed = input.starts_with(['+', '-']);
  let body = input.trim_start_matches(['+', '-']);
  let parts: Vec<u32> = body.split(['-', '/']).filter_map(|p| p.parse().ok()).collect();
  let first_is_year = signed || body.split(['-', '/']).next().map(|p| p.len() == 4).unwrap_or(false);

  if first_is_year {
    match parts.as_slice() {
      [_, m, ..] if !(1..=12).contains(m) => format!("month {m} out of range"),
      [y, m, day] => format!("day {day} out of range for {y:04}-{m:02}"),
      _ => "incomplete date".to_string(),
    }
  } else {
    match parts.as_slice() {
      [a, b, _] if *a > 12 && *b > 12 => format!("neither {a} nor {b} is a valid month"),
      [_, _, _] => "day out of range for month".to_string(),
      _ => "incomplete date".to_string(),
    }
  }
}

fn parse_relative(input: &str, today: NaiveDate) -> Option<NaiveDate> {
  let phrase = input.to_lowercase();
  match phrase.as_str() {
    "today" => return Some(today),
    "yesterday" => return today.pred_opt(),
    "tomorrow" => return today.succ_opt(),
    _ => {}
  }

  if let Some(caps) = RELATIVE_AGO.captures(&phrase) {
    let n: i64 = caps[1].parse().ok()?;
    return match &caps[2] {
      "day" => today.checked_sub_signed(Duration::try_days(n)?),
      "week" => today.checked_sub_signed(Duration::try_weeks(n)?),
      "month" => shift_months(today, -i32::try_from(n).ok()?),
      "year" => shift_months(today, -i32::try_from(n.checked_mul(12)?).ok()?),
      _ => None,
    };
  }

  // Remaining duration phrases ("a fortnight ago", "3 weeks") via chrono-english.
  match parse_duration(&phrase).ok()? {
    Interval::Seconds(secs) => {
      let days = (i64::from(secs)).div_euclid(86_400);
      today.checked_add_signed(Duration::days(days))
    }
    Interval::Days(days) => today.checked_add_signed(Duration::days(days.into())),
    Interval::Months(months) => shift_months(today, months),
  }
}

/// Move `date` by `n` calendar months, clamping the day to the target month's length.
pub fn shift_months(date: NaiveDate, n: i32) -> Option<NaiveDate> {
  let total = (date.year() * 12 + date.month0() as i32).checked_add(n)?;
  let y = total.div_euclid(12);
  let m = total.rem_euclid(12) as u32 + 1;
  let d = date.day().min(last_day_of_month(y, m)?);
  NaiveDate::from_ymd_opt(y, m, d)
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
  let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
  let first_next = NaiveDate::from_ymd_opt(ny, nm, 1)?;
  Some(first_next.pred_opt()?.day())
}

fn month_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
  let start = date.with_day(1).unwrap_or(date);
  let last = last_day_of_month(date.year(), date.month()).unwrap_or(28);
  (start, date.with_day(last).unwrap_or(date))
}

fn quarter_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
  let q0 = date.month0() / 3;
  let start = NaiveDate::from_ymd_opt(date.year(), q0 * 3 + 1, 1).unwrap_or(date);
  let (_, end) = month_range(NaiveDate::from_ymd_opt(date.year(), q0 * 3 + 3, 1).unwrap_or(date));
  (start, end)
}

fn year_range(year: i32) -> (NaiveDate, NaiveDate) {
  (
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN),
    NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MAX),
  )
}

fn start_of_week(date: NaiveDate) -> NaiveDate {
  date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

// --- Presets ---

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Preset {
  ThisWeek,
  ThisMonth,
  ThisQuarter,
  ThisYear,
  LastMonth,
  LastQuarter,
  LastYear,
  Last7Days,
  Last30Days,
  Last90Days,
  YearToDate,
}

impl Preset {
  pub const ALL: [Preset; 11] = [
    Preset::ThisWeek,
    Preset::ThisMonth,
    Preset::ThisQuarter,
    Preset::ThisYear,
    Preset::LastMonth,
    Preset::LastQuarter,
    Preset::LastYear,
    Preset::Last7Days,
    Preset::Last30Days,
    Preset::Last90Days,
    Preset::YearToDate,
  ];

  pub fn name(self) -> &'static str {
    match self {
      Preset::ThisWeek => "This Week",
      Preset::ThisMonth => "This Month",
      Preset::ThisQuarter => "This Quarter",
      Preset::ThisYear => "This Year",
      Preset::LastMonth => "Last Month",
      Preset::LastQuarter => "Last Quarter",
      Preset::LastYear => "Last Year",
      Preset::Last7Days => "Last 7 Days",
      Preset::Last30Days => "Last 30 Days",
      Preset::Last90Days => "Last 90 Days",
      Preset::YearToDate => "Year to Date",
    }
  }

  /// Fixed `end - start` length for rolling presets.
  pub fn rolling_days(self) -> Option<i64> {
    match self {
      Preset::Last7Days => Some(7),
      Preset::Last30Days => Some(30),
      Preset::Last90Days => Some(90),
      _ => None,
    }
  }

  /// Concrete range relative to `today`. "This ..." periods run to today rather than
  /// to the end of the calendar period, so they never end in the future.
  pub fn resolve(self, today: NaiveDate) -> DateRange {
    let (start, end) = match self {
      Preset::ThisWeek => (start_of_week(today), today),
      Preset::ThisMonth => (month_range(today).0, today),
      Preset::ThisQuarter => (quarter_range(today).0, today),
      Preset::ThisYear | Preset::YearToDate => (year_range(today.year()).0, today),
      Preset::LastMonth => month_range(month_range(today).0.pred_opt().unwrap_or(today)),
      Preset::LastQuarter => quarter_range(shift_months(today, -3).unwrap_or(today)),
      Preset::LastYear => year_range(today.year() - 1),
      Preset::Last7Days | Preset::Last30Days | Preset::Last90Days => {
        let n = self.rolling_days().unwrap_or(0);
        (today - Duration::days(n), today)
      }
    };
    DateRange::labeled(start, end, self.name())
  }

  pub fn expected_names() -> String {
    Preset::ALL.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
  }
}

impl fmt::Display for Preset {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Preset {
  type Err = ReportError;

  /// Case-insensitive; `-` and `_` are accepted in place of spaces (`last-30-days`).
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let norm = |v: &str| {
      v.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
    };
    let wanted = norm(s);
    Preset::ALL
      .iter()
      .copied()
      .find(|p| norm(p.name()) == wanted)
      .ok_or_else(|| ReportError::UnknownPreset {
        input: s.to_string(),
        expected: Preset::expected_names(),
      })
  }
}

pub fn resolve_preset(name: &str, today: NaiveDate) -> ReportResult<DateRange> {
  Ok(name.parse::<Preset>()?.resolve(today))
}

// --- Validation ---

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOptions {
  pub max_range_days: i64,
  pub allow_future: bool,
  pub five_year_warning: bool,
  /// Known data coverage; ranges reaching outside it get an advisory warning.
  pub coverage: Option<(NaiveDate, NaiveDate)>,
}

impl Default for ValidationOptions {
  fn default() -> Self {
    Self {
      max_range_days: 365,
      allow_future: false,
      five_year_warning: true,
      coverage: None,
    }
  }
}

/// Check a range against the configured limits.
///
/// Returns the same start/end with advisory warnings appended, or the first fatal error.
pub fn validate(range: DateRange, opts: &ValidationOptions, today: NaiveDate) -> ReportResult<DateRange> {
  if range.start > range.end {
    return Err(ReportError::InvalidRange {
      start: range.start,
      end: range.end,
    });
  }

  let span = range.span_days();
  if span > opts.max_range_days {
    return Err(ReportError::RangeTooLarge {
      start: range.start,
      end: range.end,
      days: span,
      max_days: opts.max_range_days,
    });
  }

  if range.end > today && !opts.allow_future {
    return Err(ReportError::FutureDate { end: range.end, today });
  }

  let mut out = range;
  if out.end > today {
    out.warnings.push(format!("end date {} is in the future", format_iso(out.end)));
  }

  if opts.five_year_warning {
    if let Some(five_years_ago) = shift_months(today, -60) {
      if out.start < five_years_ago {
        out.warnings.push(format!(
          "start date {} is more than 5 years old; data may be limited",
          format_iso(out.start)
        ));
      }
    }
  }

  if let Some((first, last)) = opts.coverage {
    if out.end < first || out.start > last {
      out.warnings.push(format!(
        "range lies entirely outside known data coverage ({} to {})",
        format_iso(first),
        format_iso(last)
      ));
    } else {
      if out.start < first {
        out.warnings.push(format!(
          "range starts {} days before the earliest known data ({})",
          (first - out.start).num_days(),
          format_iso(first)
        ));
      }
      if out.end > last {
        out.warnings.push(format!(
          "range ends {} days after the latest known data ({})",
          (out.end - last).num_days(),
          format_iso(last)
        ));
      }
    }
  }

  Ok(out)
}

/// Human-readable period description: "January 2025", "2025", "Q1 2025", or an explicit span.
pub fn describe_period(range: &DateRange) -> String {
  let (start, end) = (range.start, range.end);
  let days = range.day_count();

  if start.day() == 1 && end == month_range(start).1 {
    return start.format("%B %Y").to_string();
  }
  if (start, end) == year_range(start.year()) {
    return start.year().to_string();
  }
  if (start, end) == quarter_range(start) {
    return format!("Q{} {}", start.month0() / 3 + 1, start.year());
  }
  if days == 1 {
    return start.format("%B %d, %Y").to_string();
  }
  let head = if start.year() == end.year() {
    start.format("%b %d").to_string()
  } else {
    start.format("%b %d, %Y").to_string()
  };
  format!("{} - {} ({} days)", head, end.format("%b %d, %Y"), days)
}

pub fn range_type(day_count: i64) -> &'static str {
  match day_count {
    d if d <= 7 => "weekly",
    d if d <= 31 => "monthly",
    d if d <= 92 => "quarterly",
    d if d <= 366 => "yearly",
    _ => "multi-year",
  }
}

// --- Window selection (CLI) ---

/// Parse a `--now-override` string into a local DateTime.
/// Accepts RFC3339 (e.g. 2025-08-15T12:00:00Z) or a naive local timestamp
/// formatted as `%Y-%m-%dT%H:%M:%S`.
pub fn parse_now(s: Option<&str>) -> Option<DateTime<Local>> {
  s.and_then(|raw| {
    DateTime::parse_from_rfc3339(raw)
      .ok()
      .map(|dt| dt.with_timezone(&Local))
      .or_else(|| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
          .ok()
          .and_then(|ndt| ndt.and_local_timezone(Local).single())
      })
  })
}

/// Full calendar month for `YYYY-MM`.
pub fn month_bounds(year_month: &str) -> ReportResult<DateRange> {
  let start = parse_year_month(year_month.trim())?.ok_or_else(|| ReportError::DateParse {
    input: year_month.to_string(),
  })?;
  let (start, end) = month_range(start);
  Ok(DateRange::labeled(start, end, year_month.trim()))
}

/// Resolve a natural-language window ("last week", "3 weeks ago", "last march") to whole days.
pub fn for_phrase_bounds(input: &str, now: DateTime<Local>) -> ReportResult<DateRange> {
  let phrase = input.trim().to_lowercase();
  let today = now.date_naive();
  let labeled = |start: NaiveDate, end: NaiveDate| DateRange::labeled(start, end, input.trim());

  if let Ok(preset) = phrase.parse::<Preset>() {
    return Ok(preset.resolve(today));
  }

  match phrase.as_str() {
    "today" => return Ok(labeled(today, today)),
    "yesterday" => {
      let y = today.pred_opt().unwrap_or(today);
      return Ok(labeled(y, y));
    }
    "last week" => {
      let this_monday = start_of_week(today);
      return Ok(labeled(this_monday - Duration::days(7), this_monday - Duration::days(1)));
    }
    _ => {}
  }

  // last <weekday>: strictly previous occurrence through today
  if let Some(caps) = LAST_WEEKDAY.captures(&phrase) {
    let target: Weekday = caps[1].parse().map_err(|_| ReportError::DateParse { input: input.to_string() })?;
    let cur_idx = today.weekday().num_days_from_monday() as i64;
    let mut delta_days = cur_idx - target.num_days_from_monday() as i64;
    if delta_days <= 0 {
      delta_days += 7;
    }
    return Ok(labeled(today - Duration::days(delta_days), today));
  }

  // Duration/"ago" parsing via chrono-english (handle first to avoid misclassification by natural parser)
  if let Ok(interval) = parse_duration(&phrase) {
    let shifted = match interval {
      Interval::Seconds(secs) => today.checked_add_signed(Duration::days(i64::from(secs).div_euclid(86_400))),
      Interval::Days(days) => today.checked_add_signed(Duration::days(days.into())),
      Interval::Months(months) => shift_months(today, months),
    }
    .ok_or_else(|| ReportError::DateParse { input: input.to_string() })?;
    let (start, end) = if shifted <= today { (shifted, today) } else { (today, shifted) };
    return Ok(labeled(start, end));
  }

  // Natural ranges via two_timer (last month, last year, last march, this week)
  let config = PhraseConfig::new().now(now.naive_local());
  if let Ok((start, end_exclusive, _)) = parse_natural(&phrase, Some(config)) {
    let end = (end_exclusive - Duration::seconds(1)).date();
    let end = if end > today && start.date() <= today { today } else { end };
    return Ok(labeled(start.date(), end));
  }

  Err(ReportError::DateParse { input: input.to_string() })
}

/// Turn a window selection into a concrete (not yet validated) range.
pub fn resolve_window(
  window: &WindowSpec,
  now: DateTime<Local>,
  coverage: Option<(NaiveDate, NaiveDate)>,
) -> ReportResult<DateRange> {
  let today = now.date_naive();
  match window {
    WindowSpec::StartEnd { start, end } => {
      let s = parse_date(start, today)?;
      let e = parse_date(end, today)?;
      Ok(DateRange::new(s, e))
    }
    WindowSpec::Preset { name } => resolve_preset(name, today),
    WindowSpec::ForPhrase { phrase } => for_phrase_bounds(phrase, now),
    WindowSpec::Month { ym } => month_bounds(ym),
    WindowSpec::AllData => {
      let (first, last) = coverage.ok_or_else(|| ReportError::Validation("no dated records to derive a range from".into()))?;
      Ok(DateRange::labeled(first, last, "All Data"))
    }
  }
}
