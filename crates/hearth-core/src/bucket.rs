use std::collections::BTreeMap;

use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::debug;

use crate::datetime::{
  CalendarDay,
  DayFrame,
  DaySpan,
  date_span,
  days_between,
  today_in
};
use crate::model::{
  Period,
  Reminder,
  ScheduledTask,
  TaskSchedule,
  endpoint_zones
};

/// Everything shown under one calendar day.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct DayBucket {
  pub tasks:     Vec<ScheduledTask>,
  pub periods:   Vec<Period>,
  pub reminders: Vec<Reminder>
}

impl DayBucket {
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
      && self.periods.is_empty()
      && self.reminders.is_empty()
  }
}

/// Day buckets in chronological order. Serializes as an object keyed by
/// `YYYY-MM-DD`.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
#[serde(transparent)]
pub struct AllDateBuckets {
  days: BTreeMap<CalendarDay, DayBucket>
}

impl AllDateBuckets {
  #[must_use]
  pub fn get(
    &self,
    day: CalendarDay
  ) -> Option<&DayBucket> {
    self.days.get(&day)
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = CalendarDay> + '_
  {
    self.days.keys().copied()
  }

  #[must_use]
  pub fn keys(&self) -> Vec<String> {
    self
      .days
      .keys()
      .map(|day| day.as_key())
      .collect()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (CalendarDay, &DayBucket)>
  {
    self
      .days
      .iter()
      .map(|(day, bucket)| (*day, bucket))
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.days.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }

  fn bucket_mut(
    &mut self,
    day: CalendarDay
  ) -> &mut DayBucket {
    self.days.entry(day).or_default()
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
)]
pub struct BucketOptions {
  pub local_timezone:       Tz,
  pub always_include_today: bool,
  pub today:                CalendarDay
}

impl BucketOptions {
  #[must_use]
  pub fn new(
    local_timezone: Tz,
    always_include_today: bool,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      local_timezone,
      always_include_today,
      today: today_in(local_timezone, now)
    }
  }
}

/// Days a task occupies on the calendar.
#[must_use]
pub fn task_span(
  task: &ScheduledTask,
  local: Tz
) -> DaySpan {
  match &task.schedule {
    | TaskSchedule::Timed {
      start,
      end,
      start_timezone,
      end_timezone
    } => {
      let (start_tz, end_tz) =
        endpoint_zones(
          *start_timezone,
          *end_timezone,
          local
        );
      if start_tz == end_tz {
        days_between(
          *start,
          *end,
          DayFrame::Zone(start_tz)
        )
      } else {
        date_span(
          DayFrame::Zone(start_tz)
            .day_of(*start),
          DayFrame::Zone(end_tz)
            .day_of(*end)
        )
      }
    }
    | TaskSchedule::AnyTime {
      date,
      ..
    } => DaySpan::single(*date),
    | TaskSchedule::AllDay {
      start,
      end
    } => date_span(*start, *end)
  }
}

/// Groups tasks, periods and reminders under every day they touch.
#[tracing::instrument(
  skip_all,
  fields(
    tasks = tasks.len(),
    periods = periods.len(),
    reminders = reminders.len()
  )
)]
pub fn bucket_entries(
  tasks: &[ScheduledTask],
  periods: &[Period],
  reminders: &[Reminder],
  options: &BucketOptions
) -> AllDateBuckets {
  let mut buckets =
    AllDateBuckets::default();

  for task in tasks {
    for day in task_span(
      task,
      options.local_timezone
    ) {
      buckets
        .bucket_mut(day)
        .tasks
        .push(task.clone());
    }
  }

  for period in periods {
    for day in period.span() {
      buckets
        .bucket_mut(day)
        .periods
        .push(period.clone());
    }
  }

  for reminder in reminders {
    for day in reminder.span() {
      buckets
        .bucket_mut(day)
        .reminders
        .push(reminder.clone());
    }
  }

  if options.always_include_today {
    buckets.bucket_mut(options.today);
  }

  debug!(
    days = buckets.len(),
    "bucketed calendar entries"
  );
  buckets
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::*;
  use crate::model::{
    PeriodKind,
    TaskKind
  };

  fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(
      raw, "%Y-%m-%d"
    )
    .expect("valid date")
  }

  fn day(raw: &str) -> CalendarDay {
    raw.parse().expect("valid day")
  }

  fn options(
    always_include_today: bool
  ) -> BucketOptions {
    BucketOptions::new(
      chrono_tz::UTC,
      always_include_today,
      Utc
        .with_ymd_and_hms(
          2024, 6, 15, 12, 0, 0
        )
        .single()
        .expect("valid now")
    )
  }

  fn timed_task(
    id: i64,
    start: (u32, u32, u32),
    end: (u32, u32, u32)
  ) -> ScheduledTask {
    let at = |(d, h, m): (u32, u32, u32)| {
      Utc
        .with_ymd_and_hms(
          2024, 3, d, h, m, 0
        )
        .single()
        .expect("valid instant")
    };
    ScheduledTask {
      id,
      recurrence: None,
      recurrence_index: None,
      title: format!("task {id}"),
      kind: TaskKind::Fixed,
      schedule: TaskSchedule::Timed {
        start:          at(start),
        end:            at(end),
        start_timezone: None,
        end_timezone:   None
      },
      is_complete: false,
      members: vec![1],
      entities: vec![],
      tags: vec![]
    }
  }

  fn dated_task(
    id: i64,
    schedule: TaskSchedule
  ) -> ScheduledTask {
    ScheduledTask {
      kind: TaskKind::Anniversary,
      schedule,
      ..timed_task(id, (1, 0, 0), (1, 0, 0))
    }
  }

  fn period(
    id: i64,
    start: &str,
    end: &str
  ) -> Period {
    Period {
      id,
      title: format!("period {id}"),
      kind: PeriodKind::Period,
      start: date(start),
      end: date(end),
      entity: Some(5),
      members: vec![1, 2]
    }
  }

  fn reminder(
    id: i64,
    start: &str,
    end: &str
  ) -> Reminder {
    Reminder {
      id,
      title: format!("reminder {id}"),
      start: date(start),
      end: date(end),
      entity: None,
      members: vec![2],
      is_complete: false
    }
  }

  #[test]
  fn one_hour_task_lands_on_one_day() {
    let tasks =
      vec![timed_task(1, (1, 10, 0), (
        1, 11, 0
      ))];
    let buckets = bucket_entries(
      &tasks,
      &[],
      &[],
      &options(false)
    );
    assert_eq!(buckets.keys(), vec![
      "2024-03-01"
    ]);
    let bucket = buckets
      .get(day("2024-03-01"))
      .expect("bucket");
    assert_eq!(bucket.tasks, tasks);
  }

  #[test]
  fn period_covers_each_day_inclusive() {
    let periods =
      vec![period(1, "2024-03-01", "2024-03-03")];
    let buckets = bucket_entries(
      &[],
      &periods,
      &[],
      &options(false)
    );
    assert_eq!(buckets.keys(), vec![
      "2024-03-01",
      "2024-03-02",
      "2024-03-03"
    ]);
    for (_, bucket) in buckets.iter() {
      assert_eq!(bucket.periods, periods);
      assert!(bucket.tasks.is_empty());
    }
  }

  #[test]
  fn today_is_added_when_requested() {
    let buckets = bucket_entries(
      &[],
      &[],
      &[],
      &options(true)
    );
    assert_eq!(buckets.len(), 1);
    let bucket = buckets
      .get(day("2024-06-15"))
      .expect("today bucket");
    assert!(bucket.is_empty());

    let without = bucket_entries(
      &[],
      &[],
      &[],
      &options(false)
    );
    assert!(without.is_empty());
  }

  #[test]
  fn today_bucket_keeps_existing_entries() {
    let reminders =
      vec![reminder(9, "2024-06-14", "2024-06-16")];
    let buckets = bucket_entries(
      &[],
      &[],
      &reminders,
      &options(true)
    );
    assert_eq!(buckets.len(), 3);
    assert_eq!(
      buckets
        .get(day("2024-06-15"))
        .expect("today")
        .reminders
        .len(),
      1
    );
  }

  #[test]
  fn every_record_covers_exactly_its_span() {
    let tasks = vec![
      timed_task(1, (1, 22, 0), (3, 1, 0)),
      timed_task(2, (5, 9, 0), (4, 9, 0)),
      dated_task(3, TaskSchedule::AnyTime {
        date:             date("2024-03-09"),
        duration_minutes: 30
      }),
      dated_task(4, TaskSchedule::AllDay {
        start: date("2024-02-28"),
        end:   date("2024-03-02")
      }),
    ];
    let periods = vec![
      period(10, "2024-03-02", "2024-03-02"),
      period(11, "2024-02-27", "2024-03-04"),
    ];
    let reminders =
      vec![reminder(20, "2024-03-03", "2024-03-05")];
    let opts = options(false);
    let buckets = bucket_entries(
      &tasks,
      &periods,
      &reminders,
      &opts
    );

    for task in &tasks {
      let seen = buckets
        .iter()
        .filter(|(_, b)| b.tasks.contains(task))
        .map(|(d, _)| d)
        .collect::<Vec<_>>();
      let expected =
        task_span(task, opts.local_timezone)
          .iter()
          .collect::<Vec<_>>();
      assert_eq!(seen, expected);
    }
    for period in &periods {
      let seen = buckets
        .iter()
        .filter(|(_, b)| b.periods.contains(period))
        .map(|(d, _)| d)
        .collect::<Vec<_>>();
      assert_eq!(
        seen,
        period.span().iter().collect::<Vec<_>>()
      );
    }
    let reminder_days = buckets
      .iter()
      .filter(|(_, b)| !b.reminders.is_empty())
      .count();
    assert_eq!(reminder_days, 3);

    let task_days = |id: i64| {
      buckets
        .iter()
        .filter(|(_, b)| {
          b.tasks.iter().any(|t| t.id == id)
        })
        .map(|(d, _)| d.as_key())
        .collect::<Vec<_>>()
    };
    assert_eq!(task_days(2), vec![
      "2024-03-05"
    ]);
    assert_eq!(task_days(3), vec![
      "2024-03-09"
    ]);
    assert_eq!(task_days(4), vec![
      "2024-02-28",
      "2024-02-29",
      "2024-03-01",
      "2024-03-02"
    ]);
  }

  #[test]
  fn keys_sort_chronologically_and_output_is_stable() {
    let periods = vec![
      period(1, "2024-12-30", "2025-01-02"),
      period(2, "2024-02-01", "2024-02-01"),
    ];
    let first = bucket_entries(
      &[],
      &periods,
      &[],
      &options(false)
    );
    let second = bucket_entries(
      &[],
      &periods.clone(),
      &[],
      &options(false)
    );
    assert_eq!(first, second);

    let mut lexical = first.keys();
    lexical.sort();
    assert_eq!(lexical, first.keys());
    assert_eq!(
      first.days().collect::<Vec<_>>(),
      vec![
        day("2024-02-01"),
        day("2024-12-30"),
        day("2024-12-31"),
        day("2025-01-01"),
        day("2025-01-02")
      ]
    );
  }

  #[test]
  fn timed_task_uses_its_own_zones() {
    let mut flight =
      timed_task(3, (1, 22, 0), (2, 6, 0));
    if let TaskSchedule::Timed {
      start_timezone,
      end_timezone,
      ..
    } = &mut flight.schedule
    {
      *start_timezone =
        Some(chrono_tz::America::New_York);
      *end_timezone =
        Some(chrono_tz::Europe::London);
    }
    let span = task_span(
      &flight,
      chrono_tz::Asia::Tokyo
    );
    assert_eq!(
      span
        .iter()
        .map(|d| d.as_key())
        .collect::<Vec<_>>(),
      vec!["2024-03-01", "2024-03-02"]
    );
  }

  #[test]
  fn serializes_as_day_keyed_object() {
    let buckets = bucket_entries(
      &[],
      &[],
      &[reminder(4, "2024-03-01", "2024-03-01")],
      &options(false)
    );
    let json = serde_json::to_value(&buckets)
      .expect("serialize buckets");
    let reminders = json["2024-03-01"]
      ["reminders"]
      .as_array()
      .expect("reminder array");
    assert_eq!(reminders.len(), 1);
    assert_eq!(
      reminders[0]["start"],
      "2024-03-01"
    );
  }
}
