use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use hearth_api::{EntityId, RecordId, UserId};
use serde::Serialize;

use crate::datetime::{DaySpan, date_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskKind {
    #[serde(rename = "FixedTask")]
    Fixed,
    #[serde(rename = "TransportTask")]
    Transport,
    #[serde(rename = "AccommodationTask")]
    Accommodation,
    #[serde(rename = "AnniversaryTask")]
    Anniversary,
}

impl TaskKind {
    pub fn as_resourcetype(self) -> &'static str {
        match self {
            TaskKind::Fixed => "FixedTask",
            TaskKind::Transport => "TransportTask",
            TaskKind::Accommodation => "AccommodationTask",
            TaskKind::Anniversary => "AnniversaryTask",
        }
    }
}

impl FromStr for TaskKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FixedTask" => Ok(TaskKind::Fixed),
            "TransportTask" => Ok(TaskKind::Transport),
            "AccommodationTask" => Ok(TaskKind::Accommodation),
            "AnniversaryTask" | "BirthdayTask" => Ok(TaskKind::Anniversary),
            other => Err(anyhow!("unknown task resourcetype: {other}")),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_resourcetype())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PeriodKind {
    Period,
    SchoolBreak,
    SchoolTerm,
    SchoolYear,
    Holiday,
}

impl PeriodKind {
    pub fn as_resourcetype(self) -> &'static str {
        match self {
            PeriodKind::Period => "Period",
            PeriodKind::SchoolBreak => "SchoolBreak",
            PeriodKind::SchoolTerm => "SchoolTerm",
            PeriodKind::SchoolYear => "SchoolYear",
            PeriodKind::Holiday => "Holiday",
        }
    }
}

impl FromStr for PeriodKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Period" => Ok(PeriodKind::Period),
            "SchoolBreak" => Ok(PeriodKind::SchoolBreak),
            "SchoolTerm" => Ok(PeriodKind::SchoolTerm),
            "SchoolYear" => Ok(PeriodKind::SchoolYear),
            "Holiday" => Ok(PeriodKind::Holiday),
            other => Err(anyhow!("unknown period resourcetype: {other}")),
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_resourcetype())
    }
}

/// When a task happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskSchedule {
    /// Fixed instants. An endpoint without an explicit zone is read in the
    /// device timezone; the end falls back to the start's zone first.
    Timed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        start_timezone: Option<Tz>,
        end_timezone: Option<Tz>,
    },
    /// "Any time" on a single date.
    AnyTime { date: NaiveDate, duration_minutes: u32 },
    /// Date-only span, inclusive on both ends.
    AllDay { start: NaiveDate, end: NaiveDate },
}

/// Zones a timed task's start and end are read and folded into days
/// with. The start uses its own zone or `local`; the end uses its own
/// zone, then the start's, then `local`.
pub fn endpoint_zones(
    start_timezone: Option<Tz>,
    end_timezone: Option<Tz>,
    local: Tz,
) -> (Tz, Tz) {
    let start = start_timezone.unwrap_or(local);
    let end = end_timezone.or(start_timezone).unwrap_or(local);
    (start, end)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ScheduledTask {
    pub id: RecordId,
    pub recurrence: Option<RecordId>,
    pub recurrence_index: Option<u32>,
    pub title: String,
    pub kind: TaskKind,
    pub schedule: TaskSchedule,
    pub is_complete: bool,
    pub members: Vec<UserId>,
    pub entities: Vec<EntityId>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    pub id: RecordId,
    pub title: String,
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entity: Option<EntityId>,
    pub members: Vec<UserId>,
}

impl Period {
    pub fn is_one_day(&self) -> bool {
        self.start == self.end
    }

    pub fn span(&self) -> DaySpan {
        date_span(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reminder {
    pub id: RecordId,
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entity: Option<EntityId>,
    pub members: Vec<UserId>,
    pub is_complete: bool,
}

impl Reminder {
    pub fn is_one_day(&self) -> bool {
        self.start == self.end
    }

    pub fn span(&self) -> DaySpan {
        date_span(self.start, self.end)
    }
}
