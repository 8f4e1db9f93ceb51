use std::collections::BTreeMap;
use std::fmt;

use anyhow::anyhow;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::datetime::CalendarDay;
use crate::model::Period;

/// A `#rrggbb` display color, stored lower case.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
#[serde(transparent)]
pub struct LaneColor(String);

impl LaneColor {
  /// Accepts `#rgb` or `#rrggbb`, with or without the leading `#`.
  pub fn parse(
    raw: &str
  ) -> anyhow::Result<Self> {
    let hex_re = Regex::new(
      r"^#?(?P<hex>[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$"
    )
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })?;
    let caps = hex_re
      .captures(raw.trim())
      .ok_or_else(|| {
        anyhow!(
          "invalid color {raw:?}; \
           expected #rgb or #rrggbb"
        )
      })?;
    let hex = caps
      .name("hex")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing hex digits")
      })?
      .to_ascii_lowercase();

    let expanded = if hex.len() == 3 {
      hex
        .chars()
        .flat_map(|ch| [ch, ch])
        .collect::<String>()
    } else {
      hex
    };
    Ok(Self(format!("#{expanded}")))
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Default for LaneColor {
  fn default() -> Self {
    Self("#888888".to_string())
  }
}

impl fmt::Display for LaneColor {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Which periods a strip is built from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub enum PeriodSelection {
  OneDayOnly,
  MultiDayOnly,
  All
}

impl PeriodSelection {
  #[must_use]
  pub fn from_one_day_only(
    one_day_only: bool
  ) -> Self {
    if one_day_only {
      Self::OneDayOnly
    } else {
      Self::MultiDayOnly
    }
  }

  #[must_use]
  pub fn admits(
    self,
    period: &Period
  ) -> bool {
    match self {
      | Self::OneDayOnly => {
        period.is_one_day()
      }
      | Self::MultiDayOnly => {
        !period.is_one_day()
      }
      | Self::All => true
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct PlacedPeriod {
  pub period: Period,
  pub lane:   usize,
  pub color:  LaneColor
}

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct PlacedPeriods {
  lane_count: usize,
  days:       BTreeMap<
    CalendarDay,
    Vec<PlacedPeriod>
  >
}

impl PlacedPeriods {
  #[must_use]
  pub fn get(
    &self,
    day: CalendarDay
  ) -> &[PlacedPeriod] {
    self
      .days
      .get(&day)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Lanes used across the whole strip.
  #[must_use]
  pub fn lane_count(&self) -> usize {
    self.lane_count
  }

  /// Lanes a single day needs to draw every period on it.
  #[must_use]
  pub fn lane_count_on(
    &self,
    day: CalendarDay
  ) -> usize {
    self
      .get(day)
      .iter()
      .map(|placed| placed.lane + 1)
      .max()
      .unwrap_or(0)
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (CalendarDay, &[PlacedPeriod])>
  {
    self.days.iter().map(|(day, placed)| {
      (*day, placed.as_slice())
    })
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.days.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }
}

/// Greedy first-fit lane assignment in input order. A lane is reused once
/// the last period placed in it ended strictly before the next one
/// starts, so periods sharing a day never share a lane.
#[tracing::instrument(
  skip(periods, color),
  fields(periods = periods.len())
)]
pub fn place_overlapping_periods(
  periods: &[Period],
  color: &LaneColor,
  selection: PeriodSelection
) -> PlacedPeriods {
  let mut lane_ends: Vec<NaiveDate> =
    Vec::new();
  let mut days: BTreeMap<
    CalendarDay,
    Vec<PlacedPeriod>
  > = BTreeMap::new();

  for period in periods
    .iter()
    .filter(|period| selection.admits(period))
  {
    let span = period.span();
    let start = span.first().date();
    let end = span.last().date();

    let lane = lane_ends
      .iter()
      .position(|lane_end| *lane_end < start)
      .unwrap_or_else(|| {
        lane_ends.push(end);
        lane_ends.len() - 1
      });
    lane_ends[lane] = end;

    for day in span {
      days.entry(day).or_default().push(
        PlacedPeriod {
          period: period.clone(),
          lane,
          color: color.clone()
        }
      );
    }
  }

  for placed in days.values_mut() {
    placed.sort_by_key(|p| p.lane);
  }

  debug!(
    lanes = lane_ends.len(),
    days = days.len(),
    "placed overlapping periods"
  );
  PlacedPeriods {
    lane_count: lane_ends.len(),
    days
  }
}
