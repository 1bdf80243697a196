// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Build and write the run manifest listing every artifact of a report run
// role: persistence/manifest
// inputs: input path, generated_at, resolved period, cleaning stats, quality report, effective config snapshot, PageEntry[]
// outputs: manifest.json file written under the output directory
// side_effects: Writes to filesystem (previous manifest archived first)
// invariants:
// - pages[] keep the order in which pages were run
// - file paths in entries are relative to the output directory
// - generated_at is serialized in %Y-%m-%dT%H:%M:%S (local)
// errors: IO errors surfaced with full path context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::clean::CleaningStats;
use crate::config::ReportConfig;
use crate::model::PeriodInfo;
use crate::quality::QualityReport;
use crate::render::{Artifact, write_artifact};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize)]
pub struct PageEntry {
  pub id: String,
  pub title: String,
  pub files: Vec<Artifact>,
  pub overrides: usize,
  pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
  pub input: String,
  pub generated_at: String,
  pub period: PeriodInfo,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub previous_period: Option<PeriodInfo>,
  pub cleaning: CleaningStats,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quality: Option<QualityReport>,
  pub config: ReportConfig,
  pub pages: Vec<PageEntry>,
}

impl RunManifest {
  pub fn new(
    input: &str,
    generated_at: DateTime<Local>,
    period: PeriodInfo,
    cleaning: CleaningStats,
    config: &ReportConfig,
  ) -> Self {
    Self {
      input: input.to_string(),
      generated_at: generated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
      period,
      previous_period: None,
      cleaning,
      quality: None,
      config: config.clone(),
      pages: Vec::new(),
    }
  }

  pub fn push_page(&mut self, entry: PageEntry) {
    self.pages.push(entry);
  }

  pub fn write_to(&self, base_dir: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    write_artifact(base_dir, MANIFEST_FILE, &serde_json::to_vec_pretty(self)?, now)
  }
}
