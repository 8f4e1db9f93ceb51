//! Wire shapes of the planner API.
//!
//! Every date and datetime stays a string here; parsing into calendar
//! types happens in `hearth_core::ingest`.

use serde::{
  Deserialize,
  Serialize
};

pub type RecordId = i64;
pub type UserId = i64;
pub type EntityId = i64;

/// One concrete occurrence of a task. Recurring tasks arrive already
/// expanded, one record per occurrence.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ScheduledTaskDto {
  pub id:               RecordId,
  #[serde(default)]
  pub title:            String,
  pub resourcetype:     String,
  pub start_datetime:   Option<String>,
  pub end_datetime:     Option<String>,
  pub start_timezone:   Option<String>,
  pub end_timezone:     Option<String>,
  pub start_date:       Option<String>,
  pub end_date:         Option<String>,
  pub date:             Option<String>,
  pub duration:         Option<u32>,
  #[serde(default)]
  pub is_complete:      bool,
  #[serde(default)]
  pub members:          Vec<UserId>,
  #[serde(default)]
  pub entities:         Vec<EntityId>,
  #[serde(default)]
  pub tags:             Vec<String>,
  pub recurrence:       Option<RecordId>,
  pub recurrence_index: Option<u32>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct PeriodDto {
  pub id:           RecordId,
  #[serde(default)]
  pub title:        String,
  pub resourcetype: String,
  pub start_date:   Option<String>,
  pub end_date:     Option<String>,
  pub entity:       Option<EntityId>,
  #[serde(default)]
  pub members:      Vec<UserId>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct ReminderDto {
  pub id:          RecordId,
  #[serde(default)]
  pub title:       String,
  pub start_date:  Option<String>,
  pub end_date:    Option<String>,
  pub entity:      Option<EntityId>,
  #[serde(default)]
  pub members:     Vec<UserId>,
  #[serde(default)]
  pub is_complete: bool
}

/// The three collections the calendar screens fetch together.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct CalendarSnapshotDto {
  #[serde(default)]
  pub tasks:     Vec<ScheduledTaskDto>,
  #[serde(default)]
  pub periods:   Vec<PeriodDto>,
  #[serde(default)]
  pub reminders: Vec<ReminderDto>
}
