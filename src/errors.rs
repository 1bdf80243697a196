use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the cleaning, date-range and aggregation stages.
///
/// Every message names the offending value and the form that was expected so the
/// input can be corrected without reading the code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
  #[error("invalid input: {0}")]
  Validation(String),

  #[error("could not parse date '{input}'; expected YYYY-MM-DD, MM/DD/YYYY, DD/MM/YYYY, 'Month D, YYYY', YYYY-MM or a relative phrase like '30 days ago'")]
  DateParse { input: String },

  #[error("date '{input}' is not a valid calendar date ({reason}); expected a real month (1-12) and day for that month")]
  DateFormat { input: String, reason: String },

  #[error("unknown preset '{input}'; expected one of: {expected}")]
  UnknownPreset { input: String, expected: String },

  #[error("invalid range: start {start} is after end {end}; expected start <= end")]
  InvalidRange { start: NaiveDate, end: NaiveDate },

  #[error("range {start} to {end} spans {days} days, which exceeds the maximum of {max_days} days")]
  RangeTooLarge {
    start: NaiveDate,
    end: NaiveDate,
    days: i64,
    max_days: i64,
  },

  #[error("end date {end} is in the future (today is {today}); pass --allow-future to permit it")]
  FutureDate { end: NaiveDate, today: NaiveDate },

  #[error("unknown group key '{key}'; expected one of: {expected}")]
  UnknownGroupKey { key: String, expected: String },

  #[error("adjustment for '{key}' in table '{table}' matched no group; present groups: {present}")]
  AdjustmentKeyNotFound {
    table: String,
    key: String,
    present: String,
  },
}

pub type ReportResult<T> = std::result::Result<T, ReportError>;
