use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  error,
  info,
  warn
};

use crate::datetime::parse_timezone;
use crate::filter::CalendarFilter;
use crate::lanes::LaneColor;

const CONFIG_FILE: &str = "hearth.toml";
const CONFIG_DIR: &str = "hearth";
const CONFIG_ENV_VAR: &str =
  "HEARTH_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "HEARTH_TIMEZONE";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Keys accepted by `--set key=value`.
pub const OVERRIDE_KEYS: [&str; 6] = [
  "timezone",
  "color",
  "calendar.always_include_today",
  "calendar.period_color",
  "calendar.one_day_period_color",
  "visibility.show_completed"
];
const DEFAULT_PERIOD_COLOR: &str =
  "#4a90d9";
const DEFAULT_ONE_DAY_PERIOD_COLOR:
  &str = "#e0a030";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
  timezone:   Option<String>,
  color:      Option<bool>,
  calendar:   CalendarSection,
  visibility: VisibilitySection
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CalendarSection {
  always_include_today: Option<bool>,
  period_color:         Option<String>,
  one_day_period_color: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VisibilitySection {
  show_completed: Option<bool>
}

#[derive(Debug, Clone)]
pub struct Config {
  pub timezone:             Tz,
  pub color:                bool,
  pub always_include_today: bool,
  pub period_color:         LaneColor,
  pub one_day_period_color: LaneColor,
  pub show_completed:       bool,
  pub loaded_file:          Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self::from_raw(RawConfig::default())
  }
}

impl Config {
  /// Loads `hearth.toml` from the first location that applies: the
  /// explicit path, `HEARTH_CONFIG`, then the user config directory.
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = match config_override
    {
      | Some(path) => {
        Self::load_file(path)?
      }
      | None => {
        match default_config_path() {
          | Some(path)
            if path.exists() =>
          {
            Self::load_file(&path)?
          }
          | Some(path) => {
            warn!(
              file = %path.display(),
              "no config file found; using defaults"
            );
            Self::default()
          }
          | None => {
            warn!(
              "cannot determine config \
               directory; using defaults"
            );
            Self::default()
          }
        }
      }
    };

    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) =
        parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
      cfg.timezone = tz;
    }

    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let raw = toml::from_str::<RawConfig>(
      text
    )
    .context("failed to parse config")?;
    Ok(Self::from_raw(raw))
  }

  #[tracing::instrument]
  fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let mut cfg =
      Self::from_toml_str(&text)
        .with_context(|| {
          format!(
            "invalid config {}",
            path.display()
          )
        })?;
    cfg.loaded_file =
      Some(path.to_path_buf());
    info!(
      file = %path.display(),
      timezone = %cfg.timezone,
      "loaded config"
    );
    Ok(cfg)
  }

  fn from_raw(raw: RawConfig) -> Self {
    let timezone = raw
      .timezone
      .as_deref()
      .and_then(|tz| {
        parse_timezone(tz, CONFIG_FILE)
      })
      .unwrap_or_else(default_timezone);

    Self {
      timezone,
      color: raw.color.unwrap_or(true),
      always_include_today: raw
        .calendar
        .always_include_today
        .unwrap_or(true),
      period_color: sanitize_color(
        raw.calendar.period_color.as_deref(),
        DEFAULT_PERIOD_COLOR,
        "calendar.period_color"
      ),
      one_day_period_color: sanitize_color(
        raw
          .calendar
          .one_day_period_color
          .as_deref(),
        DEFAULT_ONE_DAY_PERIOD_COLOR,
        "calendar.one_day_period_color"
      ),
      show_completed: raw
        .visibility
        .show_completed
        .unwrap_or(true),
      loaded_file: None
    }
  }

  /// Applies `key=value` overrides from the command line.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "applying override");
      match key.trim() {
        | "timezone" => {
          self.timezone = parse_timezone(
            &value, "override"
          )
          .ok_or_else(|| {
            anyhow!(
              "invalid timezone: {value}"
            )
          })?;
        }
        | "color" => {
          self.color =
            parse_bool(&key, &value)?;
        }
        | "calendar.always_include_today" => {
          self.always_include_today =
            parse_bool(&key, &value)?;
        }
        | "calendar.period_color" => {
          self.period_color =
            LaneColor::parse(&value)?;
        }
        | "calendar.one_day_period_color" => {
          self.one_day_period_color =
            LaneColor::parse(&value)?;
        }
        | "visibility.show_completed" => {
          self.show_completed =
            parse_bool(&key, &value)?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: {other}"
          ));
        }
      }
    }
    Ok(())
  }

  #[must_use]
  pub fn default_filter(
    &self
  ) -> CalendarFilter {
    CalendarFilter {
      show_completed: self.show_completed,
      ..CalendarFilter::default()
    }
  }
}

fn default_config_path()
-> Option<PathBuf> {
  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir.join(CONFIG_DIR).join(CONFIG_FILE)
  })
}

fn default_timezone() -> Tz {
  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or(chrono_tz::UTC)
}

fn sanitize_color(
  raw: Option<&str>,
  fallback: &str,
  key: &str
) -> LaneColor {
  let fallback_color = || {
    LaneColor::parse(fallback)
      .unwrap_or_default()
  };

  let Some(raw) = raw else {
    return fallback_color();
  };
  match LaneColor::parse(raw) {
    | Ok(color) => color,
    | Err(err) => {
      error!(
        key,
        value = %raw,
        error = %err,
        "invalid color in config; using default"
      );
      fallback_color()
    }
  }
}

fn parse_bool(
  key: &str,
  value: &str
) -> anyhow::Result<bool> {
  match value
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Ok(true),
    | "0" | "n" | "no" | "off"
    | "false" => Ok(false),
    | other => {
      Err(anyhow!(
        "invalid boolean for {key}: \
         {other}"
      ))
    }
  }
}
