use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::cli::{AgendaArgs, Command, DaysArgs, FilterArgs, LanesArgs};
use crate::config::Config;
use crate::datetime::{DayFrame, days_between, local_midnight, parse_api_date, parse_api_datetime};
use crate::filter::CalendarFilter;
use crate::lanes::PeriodSelection;
use crate::render::Renderer;
use crate::store::CalendarStore;

#[instrument(skip(cfg, renderer, command, now))]
pub fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match command {
        Command::Agenda(args) => cmd_agenda(cfg, renderer, args, now),
        Command::Lanes(args) => cmd_lanes(cfg, renderer, args),
        Command::Days(args) => cmd_days(cfg, renderer, args),
    }
}

#[instrument(skip(cfg, renderer, args, now))]
fn cmd_agenda(
    cfg: &Config,
    renderer: &Renderer,
    args: AgendaArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut store = CalendarStore::load(&args.snapshot, cfg.timezone)?;
    let filter = build_filter(cfg, &args.filter);
    let options = store.bucket_options(cfg.always_include_today, now);

    let local = store.local_timezone();
    let skipped = store.skipped().to_vec();
    let buckets = store.day_buckets(&options, &filter);
    info!(days = buckets.len(), "built agenda");

    if args.json {
        renderer.print_json(buckets)?;
    } else {
        renderer.print_agenda(buckets, local)?;
    }
    renderer.print_skipped(&skipped)
}

#[instrument(skip(cfg, renderer, args))]
fn cmd_lanes(cfg: &Config, renderer: &Renderer, args: LanesArgs) -> anyhow::Result<()> {
    let mut store = CalendarStore::load(&args.snapshot, cfg.timezone)?;
    let filter = build_filter(cfg, &args.filter);

    let selection = if args.all {
        PeriodSelection::All
    } else {
        PeriodSelection::from_one_day_only(args.one_day)
    };
    let color = if selection == PeriodSelection::OneDayOnly {
        cfg.one_day_period_color.clone()
    } else {
        cfg.period_color.clone()
    };

    let skipped = store.skipped().to_vec();
    let placed = store.placed_periods(&color, selection, &filter);
    info!(
        lanes = placed.lane_count(),
        days = placed.len(),
        ?selection,
        "placed periods"
    );

    if args.json {
        renderer.print_json(placed)?;
    } else {
        renderer.print_lanes(placed)?;
    }
    renderer.print_skipped(&skipped)
}

#[instrument(skip(cfg, renderer))]
fn cmd_days(cfg: &Config, renderer: &Renderer, args: DaysArgs) -> anyhow::Result<()> {
    let start = parse_instant_arg(&args.start, cfg.timezone).context("invalid START")?;
    let end = parse_instant_arg(&args.end, cfg.timezone).context("invalid END")?;
    let frame = DayFrame::from_use_utc(args.utc, cfg.timezone);

    let span = days_between(start, end, frame);
    debug!(days = span.len(), ?frame, "expanded day range");
    renderer.print_days(&span)
}

fn build_filter(cfg: &Config, args: &FilterArgs) -> CalendarFilter {
    let mut filter = cfg.default_filter();
    filter.members.extend(args.members.iter().copied());
    filter.entities.extend(args.entities.iter().copied());
    if args.hide_completed {
        filter.show_completed = false;
    }
    filter
}

/// Accepts a datetime, or a bare date meaning local midnight.
fn parse_instant_arg(raw: &str, local: Tz) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(instant) = parse_api_datetime(raw, local) {
        return Ok(instant);
    }

    let date = parse_api_date(raw)?;
    local_midnight(date, local)
}
