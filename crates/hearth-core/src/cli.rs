use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::OVERRIDE_KEYS;

const LOG_ENV_VAR: &str = "HEARTH_LOG";

/// A `--set` override. Keys are matched case-insensitively, with `-`
/// accepted for `_`, and must name a `hearth.toml` setting.
#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        let key = k.trim().to_ascii_lowercase().replace('-', "_");
        if !OVERRIDE_KEYS.contains(&key.as_str()) {
            return Err(anyhow!(
                "unknown config key {key:?}; expected one of: {}",
                OVERRIDE_KEYS.join(", ")
            ));
        }
        Ok(Self {
            key,
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hearth",
    version,
    about = "Day buckets and period lanes for family planner calendars"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        long = "set",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print every day that has tasks, periods or reminders.
    Agenda(AgendaArgs),
    /// Print the lane each period occupies per day.
    Lanes(LanesArgs),
    /// Print the days between two dates or datetimes.
    Days(DaysArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only show records shared with this member id.
    #[arg(long = "member")]
    pub members: Vec<i64>,

    /// Only show records linked to this entity id.
    #[arg(long = "entity")]
    pub entities: Vec<i64>,

    #[arg(long = "hide-completed")]
    pub hide_completed: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AgendaArgs {
    /// JSON snapshot with `tasks`, `periods` and `reminders`.
    pub snapshot: PathBuf,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LanesArgs {
    pub snapshot: PathBuf,

    /// Place one-day periods instead of multi-day ones.
    #[arg(long = "one-day", conflicts_with = "all")]
    pub one_day: bool,

    /// Place every period in a single strip.
    #[arg(long = "all")]
    pub all: bool,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DaysArgs {
    pub start: String,
    pub end: String,

    /// Fold instants into UTC days instead of the configured timezone.
    #[arg(long = "utc")]
    pub utc: bool,
}

/// Filter used when neither `HEARTH_LOG` nor `RUST_LOG` is set. `-v`
/// raises only hearth's own level; dependencies stay at `warn` unless
/// `-q` lowers everything.
fn default_directive(verbose: u8, quiet: u8) -> String {
    if quiet >= 2 {
        return "error".to_string();
    }
    if quiet == 1 {
        return "warn".to_string();
    }

    let hearth_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,hearth_core={hearth_level}")
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_directive(verbose, quiet)))
        .map_err(|e| anyhow!("invalid {LOG_ENV_VAR} / RUST_LOG filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
