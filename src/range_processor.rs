// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Orchestrate one report run: load config, ingest, clean, resolve and validate the range, build pages, write artifacts and manifest
// role: processing/orchestrator
// inputs: EffectiveConfig, optional now override
// outputs: Files on disk (per-page CSV/JSON/text, manifest.json); stdout pointer {dir, manifest}
// side_effects: Creates directories; writes files; archives files it would overwrite; prints to stdout
// invariants:
// - stages run in one direction: raw -> cleaned -> windowed -> tables -> report -> files
// - every page sees the same cleaned and windowed record set
// - configuration is threaded explicitly; nothing is read from global state
// errors: Propagates typed stage errors and IO errors with file path context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::assemble::{AssembleOptions, assemble, period_info};
use crate::clean::{CleanOptions, CleaningStats, clean};
use crate::cli::EffectiveConfig;
use crate::compare::{compare_totals, previous_period};
use crate::config::ReportConfig;
use crate::ingest;
use crate::manifest::{MANIFEST_FILE, PageEntry, RunManifest};
use crate::model::RecordSet;
use crate::pages::{PageSpec, run_page, select_pages};
use crate::quality;
use crate::range_windows::{format_iso, resolve_window, validate};
use crate::render;
use crate::util;

#[derive(Debug, Clone)]
pub struct RunOutcome {
  pub dir: String,
  pub manifest: PathBuf,
}

fn cleaning_notes(stats: &CleaningStats, in_period: &RecordSet) -> Vec<String> {
  let mut notes = vec![format!(
    "{} rows loaded; {} kept after cleaning",
    stats.rows_loaded, stats.rows_kept
  )];
  if stats.dropped_zero_hours > 0 {
    notes.push(format!("{} rows with zero hours dropped", stats.dropped_zero_hours));
  }
  if stats.skipped_invalid > 0 {
    notes.push(format!("{} rows skipped for unusable hours or date", stats.skipped_invalid));
  }
  if stats.removed_duplicates > 0 {
    notes.push(format!("{} duplicate rows removed while cleaning", stats.removed_duplicates));
  }
  if stats.dropped_future > 0 {
    notes.push(format!("{} rows dated after today dropped", stats.dropped_future));
  }
  notes.push(format!(
    "{} records ({} hours) fall inside the period",
    in_period.len(),
    crate::model::fmt_value(in_period.total_hours())
  ));
  notes
}

struct PageContext<'a> {
  report_cfg: &'a ReportConfig,
  windowed: &'a RecordSet,
  previous: Option<&'a RecordSet>,
  previous_info: Option<crate::model::PeriodInfo>,
  range: &'a crate::model::DateRange,
  notes: &'a [String],
  warnings: &'a [String],
  now: DateTime<Local>,
}

fn build_page(page: &PageSpec, ctx: &PageContext<'_>) -> Result<crate::model::SummaryReport> {
  let keep = ctx.report_cfg.keep;
  let built = run_page(page, ctx.windowed, keep).with_context(|| format!("building page {}", page.id))?;

  // Both sides are compared before adjustments so the change reflects source data.
  let comparison = match ctx.previous {
    Some(prev_set) => {
      let prev = run_page(page, prev_set, keep).with_context(|| format!("building previous period for {}", page.id))?;
      compare_totals(&built.tables, &prev.tables)
    }
    None => Vec::new(),
  };

  let mut warnings = ctx.warnings.to_vec();
  warnings.extend(built.warnings);

  let report = assemble(
    &page.id,
    &page.title,
    built.tables,
    &ctx.report_cfg.adjustments_for(&page.id),
    ctx.range,
    AssembleOptions {
      strict_adjustments: ctx.report_cfg.strict_adjustments,
      top_n: ctx.report_cfg.top_n,
      generated_at: ctx.now.format("%Y-%m-%dT%H:%M:%S").to_string(),
      record_count: ctx.windowed.len(),
      warnings,
      notes: ctx.notes.to_vec(),
      previous_period: ctx.previous_info.clone(),
      comparison,
    },
  )
  .with_context(|| format!("assembling page {}", page.id))?;
  Ok(report)
}

/// Run the whole pipeline and write every artifact; returns where they went.
pub fn run_report(cfg: &EffectiveConfig, now_opt: Option<DateTime<Local>>) -> Result<RunOutcome> {
  let now = util::effective_now(now_opt);
  let today = now.date_naive();

  // Phase 1: configuration
  let report_cfg = ReportConfig::load(cfg.config_path.as_deref().map(Path::new))?.with_overrides(&cfg.overrides)?;
  let pages = select_pages(&cfg.pages, &report_cfg)?;

  // Phase 2: ingest + clean
  let raw = ingest::load_records(Path::new(&cfg.input))?;
  let quality = quality::assess(&raw, today);
  let clean_opts = CleanOptions {
    dedupe: cfg.dedupe,
    keep: report_cfg.keep,
    today,
    allow_future: report_cfg.allow_future,
  };
  let cleaned = clean(&raw, &cfg.input, &clean_opts)?;

  // Phase 3: resolve + validate the period
  let coverage = cleaned.records.coverage();
  let range = resolve_window(&cfg.window, now, coverage)?;
  let range = validate(range, &report_cfg.validation_options(coverage), today)?;
  for w in &range.warnings {
    warn!("{}", w);
  }
  info!(start = %format_iso(range.start), end = %format_iso(range.end), label = ?range.label, "resolved period");

  let windowed = cleaned.records.within(&range);
  let mut warnings = cleaned.warnings.clone();
  if windowed.is_empty() {
    let w = format!(
      "no records fall between {} and {}",
      format_iso(range.start),
      format_iso(range.end)
    );
    warn!("{}", w);
    warnings.push(w);
  }

  let previous_range = cfg.compare_previous.then(|| previous_period(&range));
  let previous_set = previous_range.as_ref().map(|p| cleaned.records.within(p));
  let mut notes = cleaning_notes(&cleaned.stats, &windowed);
  notes.extend(quality.notes());

  // Phase 4: pages -> files
  let dir = util::prepare_out_dir(&cfg.out, now_opt)?;
  let dir_path = Path::new(&dir);
  let mut manifest = RunManifest::new(&cfg.input, now, period_info(&range), cleaned.stats.clone(), &report_cfg);
  manifest.previous_period = previous_range.as_ref().map(period_info);
  manifest.quality = Some(quality);

  let ctx = PageContext {
    report_cfg: &report_cfg,
    windowed: &windowed,
    previous: previous_set.as_ref(),
    previous_info: manifest.previous_period.clone(),
    range: &range,
    notes: &notes,
    warnings: &warnings,
    now,
  };

  for page in &pages {
    let report = build_page(page, &ctx)?;
    let files = render::write_page(&report, dir_path, now)?;
    manifest.push_page(PageEntry {
      id: page.id.clone(),
      title: page.title.clone(),
      files,
      overrides: report.overrides.len(),
      warnings: report.warnings.len(),
    });
  }

  let manifest_path = manifest.write_to(dir_path, now)?;
  info!(dir = %dir, pages = pages.len(), "report run complete");
  Ok(RunOutcome {
    dir,
    manifest: manifest_path,
  })
}

pub fn process_run(cfg: &EffectiveConfig, now_opt: Option<DateTime<Local>>) -> Result<()> {
  let outcome = run_report(cfg, now_opt)?;
  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({"dir": outcome.dir, "manifest": MANIFEST_FILE}))?
  );
  Ok(())
}
