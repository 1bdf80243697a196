use anyhow::{Result, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clean::DedupeStrategy;
use crate::config::{KeepPolicy, Overrides};
use crate::range_windows::WindowSpec;
use crate::util;

#[derive(Parser, Debug)]
#[command(
    name = "volunteer-report",
    version,
    about = "Clean volunteer activity records and build dated report tables",
    long_about = None
)]
pub struct Cli {
  /// Record file (CSV with a header row, or JSON)
  #[arg(long)]
  pub input: Option<PathBuf>,

  /// Range start (YYYY-MM-DD, MM/DD/YYYY, "Jan 5, 2025", "30 days ago", ...); must be paired with --end
  #[arg(long)]
  pub start: Option<String>,

  /// Range end, inclusive; must be paired with --start
  #[arg(long)]
  pub end: Option<String>,

  /// Named range, e.g. "Last Month" or last-30-days (see --list-presets)
  #[arg(long)]
  pub preset: Option<String>,

  /// Natural language window, e.g. "last week" or "3 weeks ago"
  #[arg(long = "for")]
  pub for_str: Option<String>,

  /// Calendar month, e.g. 2025-08
  #[arg(long)]
  pub month: Option<String>,

  /// Use the full span of dates present in the input
  #[arg(long)]
  pub all: bool,

  /// Report page to build (repeatable; default: every configured page)
  #[arg(long = "page")]
  pub pages: Vec<String>,

  /// Output directory (default: auto-named temp dir)
  #[arg(long, default_value = "-")]
  pub out: String,

  /// JSON configuration file (limits, adjustments, page table)
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// Also compute totals for the preceding period and report the change
  #[arg(long)]
  pub compare_previous: bool,

  /// Maximum range length in days (end - start)
  #[arg(long = "max-days")]
  pub max_days: Option<i64>,

  /// Permit ranges ending after today and keep future-dated rows
  #[arg(long)]
  pub allow_future: bool,

  /// Which duplicate survives dedupe
  #[arg(long, value_enum)]
  pub keep: Option<KeepPolicy>,

  /// Dedupe applied while cleaning, before any table-level dedupe
  #[arg(long, value_enum, default_value_t = DedupeStrategy::None)]
  pub dedupe: DedupeStrategy,

  /// Fail when an adjustment names a group that is not in its table
  #[arg(long)]
  pub strict_adjustments: bool,

  /// Entries listed per table in the narrative
  #[arg(long)]
  pub top_n: Option<usize>,

  /// Debug logging on stderr
  #[arg(short, long, conflicts_with = "quiet")]
  pub verbose: bool,

  /// Errors only on stderr
  #[arg(short, long)]
  pub quiet: bool,

  /// Print every preset with its resolved range and exit
  #[arg(long)]
  pub list_presets: bool,

  /// Parse a date expression, print the result and exit
  #[arg(long, value_name = "TEXT")]
  pub validate_date: Option<String>,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override the "now" instant for date resolution (hidden; tests only)
  #[arg(long = "now-override", hide = true)]
  pub now_override: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EffectiveConfig {
  pub input: String, // absolute path for stability
  pub window: WindowSpec,
  pub pages: Vec<String>,
  pub out: String,
  pub config_path: Option<String>,
  pub overrides: Overrides,
  pub dedupe: DedupeStrategy,
  pub compare_previous: bool,
  pub now_override: Option<String>,
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  // Validate window selection
  let window = match (&cli.start, &cli.end, &cli.preset, &cli.for_str, &cli.month, cli.all) {
    (Some(s), Some(e), None, None, None, false) => WindowSpec::StartEnd {
      start: s.clone(),
      end: e.clone(),
    },
    (None, None, Some(p), None, None, false) => WindowSpec::Preset { name: p.clone() },
    (None, None, None, Some(p), None, false) => WindowSpec::ForPhrase { phrase: p.clone() },
    (None, None, None, None, Some(ym), false) => WindowSpec::Month { ym: ym.clone() },
    (None, None, None, None, None, true) => WindowSpec::AllData,
    (Some(_), None, None, None, None, false) | (None, Some(_), None, None, None, false) => {
      bail!("--start and --end must be given together")
    }
    (None, None, None, None, None, false) => {
      bail!("Provide one of --preset, --for, --month, --all, or (--start AND --end)")
    }
    _ => bail!("Ambiguous time selection: choose only one of --start/--end | --preset | --for | --month | --all"),
  };

  let Some(input) = cli.input.as_ref() else {
    bail!("--input FILE is required to build reports");
  };

  Ok(EffectiveConfig {
    input: util::canonicalize_lossy(input),
    window,
    pages: cli.pages,
    out: cli.out,
    config_path: cli.config.as_deref().map(util::canonicalize_lossy),
    overrides: Overrides {
      max_range_days: cli.max_days,
      allow_future: cli.allow_future,
      keep: cli.keep,
      strict_adjustments: cli.strict_adjustments,
      top_n: cli.top_n,
    },
    dedupe: cli.dedupe,
    compare_previous: cli.compare_previous,
    now_override: cli.now_override,
  })
}
