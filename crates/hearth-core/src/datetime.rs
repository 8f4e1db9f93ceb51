use std::fmt;
use std::str::FromStr;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";
const MIN_KEY_YEAR: i32 = 1;
const MAX_KEY_YEAR: i32 = 9999;

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M"
];

/// A calendar date used as a bucket key. Renders as `YYYY-MM-DD`, so the
/// string keys sort in the same order as the dates.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
  #[must_use]
  pub fn new(date: NaiveDate) -> Self {
    Self(date)
  }

  #[must_use]
  pub fn date(self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn as_key(self) -> String {
    self.to_string()
  }
}

impl From<NaiveDate> for CalendarDay {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

impl fmt::Display for CalendarDay {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format(DAY_KEY_FORMAT)
    )
  }
}

impl FromStr for CalendarDay {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let date =
      NaiveDate::parse_from_str(
        s.trim(),
        DAY_KEY_FORMAT
      )
      .with_context(|| {
        format!(
          "invalid calendar day: {s}"
        )
      })?;
    check_key_year(date)?;
    Ok(Self(date))
  }
}

impl Serialize for CalendarDay {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&self.as_key())
  }
}

impl<'de> Deserialize<'de> for CalendarDay {
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    raw
      .parse()
      .map_err(serde::de::Error::custom)
  }
}

/// Which calendar instants are folded into days with.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub enum DayFrame {
  Utc,
  Zone(Tz)
}

impl DayFrame {
  #[must_use]
  pub fn from_use_utc(
    use_utc: bool,
    local: Tz
  ) -> Self {
    if use_utc {
      Self::Utc
    } else {
      Self::Zone(local)
    }
  }

  #[must_use]
  pub fn day_of(
    self,
    instant: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Self::Utc => instant.date_naive(),
      | Self::Zone(tz) => {
        instant
          .with_timezone(&tz)
          .date_naive()
      }
    }
  }
}

/// Closed, ascending run of days. Never empty.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub struct DaySpan {
  first: NaiveDate,
  last:  NaiveDate
}

impl DaySpan {
  #[must_use]
  pub fn single(day: NaiveDate) -> Self {
    Self {
      first: day,
      last:  day
    }
  }

  #[must_use]
  pub fn first(&self) -> CalendarDay {
    CalendarDay(self.first)
  }

  #[must_use]
  pub fn last(&self) -> CalendarDay {
    CalendarDay(self.last)
  }

  #[must_use]
  pub fn len(&self) -> usize {
    let days = self
      .last
      .signed_duration_since(self.first)
      .num_days();
    usize::try_from(days)
      .unwrap_or(0)
      .saturating_add(1)
  }

  #[must_use]
  pub fn is_single_day(&self) -> bool {
    self.first == self.last
  }

  #[must_use]
  pub fn contains(
    &self,
    day: CalendarDay
  ) -> bool {
    self.first <= day.0
      && day.0 <= self.last
  }

  /// Starts a fresh pass over the span; call again to restart.
  #[must_use]
  pub fn iter(&self) -> DaySpanIter {
    DaySpanIter {
      next: Some(self.first),
      last: self.last
    }
  }
}

impl IntoIterator for DaySpan {
  type IntoIter = DaySpanIter;
  type Item = CalendarDay;

  fn into_iter(self) -> DaySpanIter {
    self.iter()
  }
}

impl IntoIterator for &DaySpan {
  type IntoIter = DaySpanIter;
  type Item = CalendarDay;

  fn into_iter(self) -> DaySpanIter {
    self.iter()
  }
}

#[derive(Debug, Clone)]
pub struct DaySpanIter {
  next: Option<NaiveDate>,
  last: NaiveDate
}

impl Iterator for DaySpanIter {
  type Item = CalendarDay;

  fn next(
    &mut self
  ) -> Option<CalendarDay> {
    let current = self.next?;
    if current > self.last {
      self.next = None;
      return None;
    }
    self.next = if current == self.last
    {
      None
    } else {
      current.succ_opt()
    };
    Some(CalendarDay(current))
  }

  fn size_hint(
    &self
  ) -> (usize, Option<usize>) {
    let remaining = match self.next {
      | Some(next) if next <= self.last => {
        let days = self
          .last
          .signed_duration_since(next)
          .num_days();
        usize::try_from(days)
          .unwrap_or(0)
          .saturating_add(1)
      }
      | _ => 0
    };
    (remaining, Some(remaining))
  }
}

/// Days touched by `[start, end]` once both instants are folded into
/// days in `frame`. An inverted range collapses to the start day.
#[must_use]
pub fn days_between(
  start: DateTime<Utc>,
  end: DateTime<Utc>,
  frame: DayFrame
) -> DaySpan {
  date_span(
    frame.day_of(start),
    frame.day_of(end)
  )
}

/// Closed span over date-only values.
#[must_use]
pub fn date_span(
  start: NaiveDate,
  end: NaiveDate
) -> DaySpan {
  if end < start {
    tracing::debug!(
      start = %start,
      end = %end,
      "inverted day range; using start day only"
    );
    return DaySpan::single(start);
  }
  DaySpan {
    first: start,
    last:  end
  }
}

#[must_use]
pub fn today_in(
  tz: Tz,
  now: DateTime<Utc>
) -> CalendarDay {
  CalendarDay(
    now.with_timezone(&tz).date_naive()
  )
}

/// First instant of `date` in `tz`.
pub fn local_midnight(
  date: NaiveDate,
  tz: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {date}"
      )
    })?;
  to_utc_from_local(
    midnight, tz, "midnight"
  )
}

/// Parses an API date field. A trailing time component is ignored so
/// that date-only fields land on the same day in every timezone.
pub fn parse_api_date(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let token = raw.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "date value is empty"
    ));
  }

  let date_part = match token
    .char_indices()
    .nth(10)
  {
    | Some((idx, 'T' | 't' | ' ')) => {
      &token[..idx]
    }
    | _ => token
  };

  let date = NaiveDate::parse_from_str(
    date_part,
    DAY_KEY_FORMAT
  )
  .with_context(|| {
    format!("invalid date: {raw}")
  })?;
  check_key_year(date)?;
  Ok(date)
}

/// Parses an API datetime field. Values carrying an offset are taken as
/// is; naive values are read as wall-clock time in `fallback`.
pub fn parse_api_datetime(
  raw: &str,
  fallback: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = raw.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "datetime value is empty"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    let utc = dt.with_timezone(&Utc);
    check_key_year(utc.date_naive())?;
    return Ok(utc);
  }

  for fmt in NAIVE_DATETIME_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      check_key_year(ndt.date())?;
      return to_utc_from_local(
        ndt, fallback, token
      );
    }
  }

  Err(anyhow!(
    "unrecognized datetime: {raw}"
  ))
  .with_context(|| {
    "supported formats: RFC3339, \
     YYYY-MM-DDTHH:MM[:SS], \
     YYYY-MM-DD HH:MM[:SS]"
  })
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn to_utc_from_local(
  local_naive: NaiveDateTime,
  tz: Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in {tz}: {context}"
      ))
    }
  }
}

fn check_key_year(
  date: NaiveDate
) -> anyhow::Result<()> {
  let year = date.year();
  if (MIN_KEY_YEAR..=MAX_KEY_YEAR)
    .contains(&year)
  {
    Ok(())
  } else {
    Err(anyhow!(
      "year {year} is outside \
       {MIN_KEY_YEAR}..={MAX_KEY_YEAR}"
    ))
  }
}
