use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use hearth_api::{
  CalendarSnapshotDto,
  PeriodDto,
  RecordId,
  ReminderDto,
  ScheduledTaskDto
};
use serde::de::DeserializeOwned;
use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;
use tracing::{
  debug,
  warn
};

use crate::datetime::{
  parse_api_date,
  parse_api_datetime
};
use crate::model::{
  Period,
  PeriodKind,
  Reminder,
  ScheduledTask,
  TaskKind,
  TaskSchedule,
  endpoint_zones
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
  Task,
  Period,
  Reminder
}

/// A record left out of the calendar, with the reason. `id` is `None`
/// when the record was too malformed to read one.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct Skipped {
  pub record: RecordKind,
  pub id:     Option<RecordId>,
  pub reason: String
}

#[derive(Debug, Clone, Default)]
pub struct Ingested {
  pub tasks:     Vec<ScheduledTask>,
  pub periods:   Vec<Period>,
  pub reminders: Vec<Reminder>,
  pub skipped:   Vec<Skipped>
}

impl Ingested {
  fn skip(
    &mut self,
    record: RecordKind,
    id: Option<RecordId>,
    err: &anyhow::Error
  ) {
    let reason = format!("{err:#}");
    warn!(
      ?record,
      ?id,
      reason = %reason,
      "skipping record with unusable dates"
    );
    self.skipped.push(Skipped {
      record,
      id,
      reason
    });
  }
}

/// Parses a fetched snapshot. Records that cannot be placed on the
/// calendar are reported in `skipped` and never abort the rest.
#[tracing::instrument(
  skip(snapshot),
  fields(
    tasks = snapshot.tasks.len(),
    periods = snapshot.periods.len(),
    reminders = snapshot.reminders.len()
  )
)]
pub fn ingest(
  snapshot: &CalendarSnapshotDto,
  local: Tz
) -> Ingested {
  let mut out = Ingested::default();

  for dto in &snapshot.tasks {
    match parse_task(dto, local) {
      | Ok(task) => out.tasks.push(task),
      | Err(err) => {
        out.skip(
          RecordKind::Task,
          Some(dto.id),
          &err
        )
      }
    }
  }

  for dto in &snapshot.periods {
    match parse_period(dto) {
      | Ok(period) => {
        out.periods.push(period)
      }
      | Err(err) => {
        out.skip(
          RecordKind::Period,
          Some(dto.id),
          &err
        )
      }
    }
  }

  for dto in &snapshot.reminders {
    match parse_reminder(dto) {
      | Ok(reminder) => {
        out.reminders.push(reminder)
      }
      | Err(err) => {
        out.skip(
          RecordKind::Reminder,
          Some(dto.id),
          &err
        )
      }
    }
  }

  debug!(
    tasks = out.tasks.len(),
    periods = out.periods.len(),
    reminders = out.reminders.len(),
    skipped = out.skipped.len(),
    "ingested calendar snapshot"
  );
  out
}

/// Top-level shape of a snapshot file with every record left undecoded,
/// so one malformed record cannot take the others down with it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LooseSnapshot {
  tasks:     Vec<Value>,
  periods:   Vec<Value>,
  reminders: Vec<Value>
}

/// Parses snapshot JSON record by record. Only a document that is not an
/// object of record arrays is an error; records that fail to decode are
/// reported in `skipped` like any other unusable record.
#[tracing::instrument(skip(text, local))]
pub fn ingest_json(
  text: &str,
  local: Tz
) -> anyhow::Result<Ingested> {
  let loose =
    serde_json::from_str::<LooseSnapshot>(
      text
    )
    .context(
      "snapshot must be an object with \
       tasks, periods and reminders arrays"
    )?;

  let mut out = Ingested::default();

  for value in loose.tasks {
    let id = record_id(&value);
    match decode::<ScheduledTaskDto>(value)
      .and_then(|dto| parse_task(&dto, local))
    {
      | Ok(task) => out.tasks.push(task),
      | Err(err) => {
        out.skip(RecordKind::Task, id, &err)
      }
    }
  }

  for value in loose.periods {
    let id = record_id(&value);
    match decode::<PeriodDto>(value)
      .and_then(|dto| parse_period(&dto))
    {
      | Ok(period) => {
        out.periods.push(period)
      }
      | Err(err) => {
        out.skip(
          RecordKind::Period,
          id,
          &err
        )
      }
    }
  }

  for value in loose.reminders {
    let id = record_id(&value);
    match decode::<ReminderDto>(value)
      .and_then(|dto| parse_reminder(&dto))
    {
      | Ok(reminder) => {
        out.reminders.push(reminder)
      }
      | Err(err) => {
        out.skip(
          RecordKind::Reminder,
          id,
          &err
        )
      }
    }
  }

  debug!(
    tasks = out.tasks.len(),
    periods = out.periods.len(),
    reminders = out.reminders.len(),
    skipped = out.skipped.len(),
    "ingested snapshot json"
  );
  Ok(out)
}

fn record_id(
  value: &Value
) -> Option<RecordId> {
  value.get("id").and_then(Value::as_i64)
}

fn decode<T>(
  value: Value
) -> anyhow::Result<T>
where
  T: DeserializeOwned
{
  serde_json::from_value(value).context(
    "record does not match the API shape"
  )
}

pub fn parse_task(
  dto: &ScheduledTaskDto,
  local: Tz
) -> anyhow::Result<ScheduledTask> {
  let kind = dto
    .resourcetype
    .parse::<TaskKind>()?;
  let schedule =
    parse_schedule(dto, local)
      .with_context(|| {
        format!("task {}", dto.id)
      })?;

  Ok(ScheduledTask {
    id: dto.id,
    recurrence: dto.recurrence,
    recurrence_index: dto
      .recurrence_index,
    title: dto.title.clone(),
    kind,
    schedule,
    is_complete: dto.is_complete,
    members: dto.members.clone(),
    entities: dto.entities.clone(),
    tags: dto.tags.clone()
  })
}

pub fn parse_period(
  dto: &PeriodDto
) -> anyhow::Result<Period> {
  let kind = dto
    .resourcetype
    .parse::<PeriodKind>()?;
  let (start, end) = parse_date_range(
    dto.start_date.as_deref(),
    dto.end_date.as_deref()
  )
  .with_context(|| {
    format!("period {}", dto.id)
  })?;

  Ok(Period {
    id: dto.id,
    title: dto.title.clone(),
    kind,
    start,
    end,
    entity: dto.entity,
    members: dto.members.clone()
  })
}

pub fn parse_reminder(
  dto: &ReminderDto
) -> anyhow::Result<Reminder> {
  let (start, end) = parse_date_range(
    dto.start_date.as_deref(),
    dto.end_date.as_deref()
  )
  .with_context(|| {
    format!("reminder {}", dto.id)
  })?;

  Ok(Reminder {
    id: dto.id,
    title: dto.title.clone(),
    start,
    end,
    entity: dto.entity,
    members: dto.members.clone(),
    is_complete: dto.is_complete
  })
}

fn parse_schedule(
  dto: &ScheduledTaskDto,
  local: Tz
) -> anyhow::Result<TaskSchedule> {
  let start_timezone = dto
    .start_timezone
    .as_deref()
    .map(parse_explicit_timezone)
    .transpose()?;
  let end_timezone = dto
    .end_timezone
    .as_deref()
    .map(parse_explicit_timezone)
    .transpose()?;

  match (
    dto.start_datetime.as_deref(),
    dto.end_datetime.as_deref()
  ) {
    | (Some(start), Some(end)) => {
      let (start_tz, end_tz) =
        endpoint_zones(
          start_timezone,
          end_timezone,
          local
        );
      let start =
        parse_api_datetime(start, start_tz)
          .context("invalid start_datetime")?;
      let end =
        parse_api_datetime(end, end_tz)
          .context("invalid end_datetime")?;
      return Ok(TaskSchedule::Timed {
        start,
        end,
        start_timezone,
        end_timezone
      });
    }
    | (Some(_), None)
    | (None, Some(_)) => {
      return Err(anyhow!(
        "start_datetime and \
         end_datetime must be set \
         together"
      ));
    }
    | (None, None) => {}
  }

  if dto.start_date.is_some()
    || dto.end_date.is_some()
  {
    let (start, end) = parse_date_range(
      dto.start_date.as_deref(),
      dto.end_date.as_deref()
    )?;
    return Ok(TaskSchedule::AllDay {
      start,
      end
    });
  }

  if let Some(date) = dto.date.as_deref()
  {
    let date = parse_api_date(date)
      .context("invalid date")?;
    return Ok(TaskSchedule::AnyTime {
      date,
      duration_minutes: dto
        .duration
        .unwrap_or(0)
    });
  }

  Err(anyhow!("no date fields set"))
}

fn parse_date_range(
  start: Option<&str>,
  end: Option<&str>
) -> anyhow::Result<(NaiveDate, NaiveDate)>
{
  let start = start
    .ok_or_else(|| {
      anyhow!("missing start_date")
    })
    .and_then(parse_api_date)
    .context("invalid start_date")?;
  let end = end
    .ok_or_else(|| {
      anyhow!("missing end_date")
    })
    .and_then(parse_api_date)
    .context("invalid end_date")?;
  Ok((start, end))
}

fn parse_explicit_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  raw.trim().parse::<Tz>().map_err(
    |err| {
      anyhow!(
        "invalid timezone {raw:?}: \
         {err}"
      )
    }
  )
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };
  use hearth_api::{
    CalendarSnapshotDto,
    PeriodDto,
    ReminderDto,
    ScheduledTaskDto
  };

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn timed_dto(
    id: i64,
    start: &str,
    end: &str
  ) -> ScheduledTaskDto {
    ScheduledTaskDto {
      id,
      title: format!("task {id}"),
      resourcetype: "FixedTask"
        .to_string(),
      start_datetime: Some(
        start.to_string()
      ),
      end_datetime: Some(
        end.to_string()
      ),
      ..ScheduledTaskDto::default()
    }
  }

  #[test]
  fn schedule_is_picked_by_field_presence() {
    let timed = parse_task(
      &timed_dto(
        1,
        "2024-03-01T10:00",
        "2024-03-01T11:00"
      ),
      chrono_tz::Europe::London
    )
    .expect("timed task");
    assert!(matches!(
      timed.schedule,
      TaskSchedule::Timed { .. }
    ));

    let all_day = parse_task(
      &ScheduledTaskDto {
        id: 2,
        resourcetype:
          "AccommodationTask"
            .to_string(),
        start_date: Some(
          "2024-03-01".to_string()
        ),
        end_date: Some(
          "2024-03-04".to_string()
        ),
        ..ScheduledTaskDto::default()
      },
      chrono_tz::UTC
    )
    .expect("all-day task");
    assert_eq!(
      all_day.schedule,
      TaskSchedule::AllDay {
        start: date(2024, 3, 1),
        end:   date(2024, 3, 4)
      }
    );

    let any_time = parse_task(
      &ScheduledTaskDto {
        id: 3,
        resourcetype: "AnniversaryTask"
          .to_string(),
        date: Some(
          "2024-03-09".to_string()
        ),
        duration: Some(15),
        ..ScheduledTaskDto::default()
      },
      chrono_tz::UTC
    )
    .expect("any-time task");
    assert_eq!(
      any_time.schedule,
      TaskSchedule::AnyTime {
        date:             date(2024, 3, 9),
        duration_minutes: 15
      }
    );
  }

  #[test]
  fn explicit_start_zone_is_used_for_naive_times() {
    let mut dto = timed_dto(
      4,
      "2024-03-01T09:00",
      "2024-03-01T17:00"
    );
    dto.resourcetype =
      "TransportTask".to_string();
    dto.start_timezone =
      Some("Asia/Tokyo".to_string());

    let task =
      parse_task(&dto, chrono_tz::UTC)
        .expect("transport task");
    let TaskSchedule::Timed {
      start,
      end,
      ..
    } = task.schedule
    else {
      panic!("expected timed schedule");
    };
    assert_eq!(
      start,
      Utc
        .with_ymd_and_hms(
          2024, 3, 1, 0, 0, 0
        )
        .single()
        .expect("valid instant")
    );
    assert_eq!(
      end,
      Utc
        .with_ymd_and_hms(
          2024, 3, 1, 8, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn bad_records_are_reported_not_fatal() {
    let mut bad_zone = timed_dto(
      12,
      "2024-03-01T09:00",
      "2024-03-01T10:00"
    );
    bad_zone.start_timezone =
      Some("Mars/Olympus".to_string());

    let snapshot = CalendarSnapshotDto {
      tasks:     vec![
        timed_dto(
          10,
          "2024-03-01T10:00",
          "2024-03-01T11:00"
        ),
        timed_dto(
          11,
          "yesterday-ish",
          "2024-03-01T11:00"
        ),
        bad_zone,
        ScheduledTaskDto {
          id: 13,
          resourcetype: "FixedTask"
            .to_string(),
          ..ScheduledTaskDto::default()
        },
        ScheduledTaskDto {
          id: 14,
          resourcetype: "MysteryTask"
            .to_string(),
          date: Some(
            "2024-03-01".to_string()
          ),
          ..ScheduledTaskDto::default()
        },
      ],
      periods:   vec![
        PeriodDto {
          id: 20,
          resourcetype: "SchoolBreak"
            .to_string(),
          start_date: Some(
            "2024-03-01".to_string()
          ),
          end_date: Some(
            "2024-03-03".to_string()
          ),
          ..PeriodDto::default()
        },
        PeriodDto {
          id: 21,
          resourcetype: "Period"
            .to_string(),
          start_date: Some(
            "2024-03-01".to_string()
          ),
          ..PeriodDto::default()
        },
      ],
      reminders: vec![ReminderDto {
        id: 30,
        start_date: Some(
          "2024-02-30".to_string()
        ),
        end_date: Some(
          "2024-03-01".to_string()
        ),
        ..ReminderDto::default()
      }]
    };

    let ingested =
      ingest(&snapshot, chrono_tz::UTC);
    assert_eq!(ingested.tasks.len(), 1);
    assert_eq!(ingested.tasks[0].id, 10);
    assert_eq!(ingested.periods.len(), 1);
    assert!(ingested.reminders.is_empty());

    let skipped_ids = ingested
      .skipped
      .iter()
      .map(|s| (s.record, s.id))
      .collect::<Vec<_>>();
    assert_eq!(skipped_ids, vec![
      (RecordKind::Task, Some(11)),
      (RecordKind::Task, Some(12)),
      (RecordKind::Task, Some(13)),
      (RecordKind::Task, Some(14)),
      (RecordKind::Period, Some(21)),
      (RecordKind::Reminder, Some(30))
    ]);
    assert!(
      ingested.skipped[1]
        .reason
        .contains("Mars/Olympus")
    );
    assert!(
      ingested.skipped[4]
        .reason
        .contains("missing end_date")
    );
  }

  #[test]
  fn json_records_that_fail_to_decode_are_skipped() {
    let raw = r#"{
      "tasks": [
        {"id": 1, "title": "no kind", "date": "2024-03-01"},
        {"id": 2, "resourcetype": "AnniversaryTask", "date": "2024-03-01", "duration": -5},
        {"id": 3, "resourcetype": "AnniversaryTask", "date": "2024-03-01"}
      ],
      "periods": [
        {"id": 4, "resourcetype": "Period", "start_date": 20240301, "end_date": "2024-03-02"},
        {"title": "no id", "resourcetype": "Period"},
        {"id": 5, "resourcetype": "Holiday", "start_date": "2024-03-01", "end_date": "2024-03-02"}
      ]
    }"#;

    let ingested =
      ingest_json(raw, chrono_tz::UTC)
        .expect("snapshot document");
    assert_eq!(ingested.tasks.len(), 1);
    assert_eq!(ingested.tasks[0].id, 3);
    assert_eq!(ingested.periods.len(), 1);
    assert_eq!(ingested.periods[0].id, 5);

    let skipped_ids = ingested
      .skipped
      .iter()
      .map(|s| (s.record, s.id))
      .collect::<Vec<_>>();
    assert_eq!(skipped_ids, vec![
      (RecordKind::Task, Some(1)),
      (RecordKind::Task, Some(2)),
      (RecordKind::Period, Some(4)),
      (RecordKind::Period, None)
    ]);
    assert!(
      ingested.skipped[0]
        .reason
        .contains("resourcetype")
    );
  }

  #[test]
  fn json_document_must_hold_record_arrays() {
    assert!(
      ingest_json("42", chrono_tz::UTC)
        .is_err()
    );
    assert!(
      ingest_json(
        r#"{"tasks": {}}"#,
        chrono_tz::UTC
      )
      .is_err()
    );
    let empty = ingest_json("{}", chrono_tz::UTC)
      .expect("empty snapshot");
    assert!(empty.skipped.is_empty());
  }
}
