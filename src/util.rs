// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Utilities for paths, effective now, output directories, artifact timestamps, and man page rendering
// role: utilities/helpers
// inputs: Various primitives; DateTime; paths; clap CommandFactory
// outputs: Canonicalized paths, formatted timestamps, directories ensured, man page text
// side_effects: prepare_out_dir creates directories
// invariants:
// - prepare_out_dir returns an existing directory (either provided or temp timestamped)
// - artifact_stamp and archive_stamp patterns are stable and locale-independent
// errors: IO errors bubble with context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::CommandFactory;

pub fn canonicalize_lossy<P: AsRef<Path>>(p: P) -> String {
  let p = p.as_ref();
  let pb: PathBuf = match std::fs::canonicalize(p) {
    Ok(x) => x,
    Err(_) => match std::env::current_dir() {
      Ok(cwd) => cwd.join(p),
      Err(_) => PathBuf::from(p),
    },
  };
  pb.to_string_lossy().to_string()
}

/// Returns the effective "now" given an optional override.
///
/// When `override_now` is `Some`, that instant is returned; otherwise
/// the current local time is used. Keeps `Local::now()` out of the pipeline
/// so every date computation can be pinned in tests.
pub fn effective_now(override_now: Option<DateTime<Local>>) -> DateTime<Local> {
  override_now.unwrap_or_else(Local::now)
}

/// `YYYYmmdd-HHMMSS`, embedded in artifact file names.
pub fn artifact_stamp(now: DateTime<Local>) -> String {
  now.format("%Y%m%d-%H%M%S").to_string()
}

/// `YYYYmmdd_HHMMSS`, appended to archived copies.
pub fn archive_stamp(now: DateTime<Local>) -> String {
  now.format("%Y%m%d_%H%M%S").to_string()
}

/// Prepare the output directory for a report run.
///
/// - When `out` is not "-", it is treated as the target directory; it will be created if needed.
/// - When `out` is "-", a temp directory is created with a timestamped name.
///   Returns the absolute path as a String.
pub fn prepare_out_dir(out: &str, now_opt: Option<DateTime<Local>>) -> Result<String> {
  let dir = if out != "-" {
    out.to_string()
  } else {
    let eff_now = effective_now(now_opt);
    std::env::temp_dir()
      .join(format!("volunteer-report-{}", artifact_stamp(eff_now)))
      .to_string_lossy()
      .to_string()
  };
  std::fs::create_dir_all(&dir).with_context(|| format!("creating output directory {}", dir))?;

  Ok(canonicalize_lossy(&dir))
}

/// Render a section-1 man page for a clap `CommandFactory` implementor.
/// Returns the troff content as a UTF-8 string.
pub fn render_man_page<T: CommandFactory>() -> Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();

  man.render(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).to_string())
}
