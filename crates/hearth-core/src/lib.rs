pub mod bucket;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod ingest;
pub mod lanes;
pub mod memo;
pub mod model;
pub mod render;
pub mod store;

use std::ffi::OsString;

use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use bucket::{
  AllDateBuckets,
  BucketOptions,
  DayBucket,
  bucket_entries
};
pub use datetime::{
  CalendarDay,
  DayFrame,
  DaySpan,
  days_between
};
pub use lanes::{
  LaneColor,
  PeriodSelection,
  PlacedPeriod,
  PlacedPeriods,
  place_overlapping_periods
};
pub use store::CalendarStore;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting hearth CLI"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;
  debug!(
    timezone = %cfg.timezone,
    config_file = ?cfg.loaded_file,
    always_include_today = cfg.always_include_today,
    "effective config"
  );

  let renderer =
    render::Renderer::new(&cfg);

  commands::dispatch(
    &cfg,
    &renderer,
    cli.command,
    Utc::now()
  )?;

  info!("done");
  Ok(())
}
