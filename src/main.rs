use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod assemble;
mod clean;
mod cli;
mod compare;
mod config;
mod errors;
mod ingest;
mod manifest;
mod model;
mod pages;
mod quality;
mod range_processor;
mod range_windows;
mod render;
mod util;

use crate::cli::{Cli, normalize};
use crate::range_windows::{Preset, describe_period, format_iso, parse_date, range_type};

// stdout carries machine-readable output, so logs go to stderr.
fn init_tracing(verbose: bool, quiet: bool) {
  let default = if verbose {
    "volunteer_report=debug"
  } else if quiet {
    "error"
  } else {
    "volunteer_report=info"
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init();
}

fn list_presets(today: chrono::NaiveDate) {
  for p in Preset::ALL {
    let r = p.resolve(today);
    println!(
      "{:<14} {} to {}  {:>3} days  {:<9}  {}",
      p.name(),
      format_iso(r.start),
      format_iso(r.end),
      r.day_count(),
      range_type(r.day_count()),
      describe_period(&r)
    );
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(());
  }

  init_tracing(cli.verbose, cli.quiet);

  // Phase 1: resolve now
  let now_opt = range_windows::parse_now(cli.now_override.as_deref());
  let today = util::effective_now(now_opt).date_naive();

  // Introspection modes
  if cli.list_presets {
    list_presets(today);
    return Ok(());
  }
  if let Some(text) = cli.validate_date.as_deref() {
    let d = parse_date(text, today)?;
    println!("{}  ({})", format_iso(d), d.format("%A, %B %d, %Y"));
    return Ok(());
  }

  // Phase 2: normalize CLI
  let cfg = normalize(cli)?;

  // Phase 3: run the pipeline and print the pointer
  range_processor::process_run(&cfg, now_opt)
}
