use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::errors::{ReportError, ReportResult};
use crate::pages::PageSpec;
use crate::range_windows::ValidationOptions;

/// Which representative survives when several records share a dedupe key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeepPolicy {
  #[default]
  First,
  Last,
}

/// Manual overrides: `"<page>.<table>"` -> group label -> replacement value.
pub type AdjustmentTable = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

/// Run configuration. Every field has a default so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
  pub max_range_days: i64,
  pub allow_future: bool,
  pub keep: KeepPolicy,
  pub strict_adjustments: bool,
  pub top_n: usize,
  pub five_year_warning: bool,
  pub adjustments: AdjustmentTable,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pages: Option<Vec<PageSpec>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coverage: Option<Coverage>,
}

impl Default for ReportConfig {
  fn default() -> Self {
    Self {
      max_range_days: 365,
      allow_future: false,
      keep: KeepPolicy::First,
      strict_adjustments: false,
      top_n: 5,
      five_year_warning: true,
      adjustments: BTreeMap::new(),
      pages: None,
      coverage: None,
    }
  }
}

/// Values given on the command line; `None` leaves the file/default value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
  pub max_range_days: Option<i64>,
  pub allow_future: bool,
  pub keep: Option<KeepPolicy>,
  pub strict_adjustments: bool,
  pub top_n: Option<usize>,
}

impl ReportConfig {
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let Some(path) = path else {
      return Ok(Self::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let cfg: ReportConfig =
      serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.check().with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
  }

  pub fn with_overrides(mut self, o: &Overrides) -> ReportResult<Self> {
    if let Some(days) = o.max_range_days {
      self.max_range_days = days;
    }
    if let Some(keep) = o.keep {
      self.keep = keep;
    }
    if let Some(n) = o.top_n {
      self.top_n = n;
    }
    self.allow_future |= o.allow_future;
    self.strict_adjustments |= o.strict_adjustments;
    self.check()?;
    Ok(self)
  }

  fn check(&self) -> ReportResult<()> {
    if self.max_range_days < 0 {
      return Err(ReportError::Validation(format!(
        "max_range_days must be zero or positive, got {}",
        self.max_range_days
      )));
    }
    if self.top_n == 0 {
      return Err(ReportError::Validation("top_n must be at least 1, got 0".into()));
    }
    if let Some(c) = self.coverage {
      if c.start > c.end {
        return Err(ReportError::InvalidRange {
          start: c.start,
          end: c.end,
        });
      }
    }
    Ok(())
  }

  /// Date-range limits for this run; `fallback` is the input's own coverage.
  pub fn validation_options(&self, fallback: Option<(NaiveDate, NaiveDate)>) -> ValidationOptions {
    ValidationOptions {
      max_range_days: self.max_range_days,
      allow_future: self.allow_future,
      five_year_warning: self.five_year_warning,
      coverage: self.coverage.map(|c| (c.start, c.end)).or(fallback),
    }
  }

  /// Adjustments addressed to one page, keyed by that page's table ids.
  pub fn adjustments_for(&self, page_id: &str) -> AdjustmentTable {
    let prefix = format!("{page_id}.");
    self
      .adjustments
      .iter()
      .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|table| (table.to_string(), v.clone())))
      .collect()
  }
}
