use std::collections::BTreeSet;

use hearth_api::{
  EntityId,
  UserId
};
use tracing::trace;

use crate::model::{
  Period,
  Reminder,
  ScheduledTask
};

/// Restricts the calendar to selected family members and entities.
/// Empty sets mean "no restriction".
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Hash,
)]
pub struct CalendarFilter {
  pub members:        BTreeSet<UserId>,
  pub entities:       BTreeSet<EntityId>,
  pub show_completed: bool
}

impl Default for CalendarFilter {
  fn default() -> Self {
    Self {
      members:        BTreeSet::new(),
      entities:       BTreeSet::new(),
      show_completed: true
    }
  }
}

impl CalendarFilter {
  #[must_use]
  pub fn is_noop(&self) -> bool {
    self.members.is_empty()
      && self.entities.is_empty()
      && self.show_completed
  }

  #[must_use]
  pub fn keeps_task(
    &self,
    task: &ScheduledTask
  ) -> bool {
    (self.show_completed
      || !task.is_complete)
      && shares_any(
        &self.members,
        &task.members
      )
      && shares_any(
        &self.entities,
        &task.entities
      )
  }

  #[must_use]
  pub fn keeps_period(
    &self,
    period: &Period
  ) -> bool {
    shares_any(
      &self.members,
      &period.members
    ) && matches_entity(
      &self.entities,
      period.entity
    )
  }

  #[must_use]
  pub fn keeps_reminder(
    &self,
    reminder: &Reminder
  ) -> bool {
    (self.show_completed
      || !reminder.is_complete)
      && shares_any(
        &self.members,
        &reminder.members
      )
      && matches_entity(
        &self.entities,
        reminder.entity
      )
  }

  #[must_use]
  pub fn apply_tasks(
    &self,
    tasks: &[ScheduledTask]
  ) -> Vec<ScheduledTask> {
    let kept = tasks
      .iter()
      .filter(|task| self.keeps_task(task))
      .cloned()
      .collect::<Vec<_>>();
    trace!(
      before = tasks.len(),
      after = kept.len(),
      "filtered tasks"
    );
    kept
  }

  #[must_use]
  pub fn apply_periods(
    &self,
    periods: &[Period]
  ) -> Vec<Period> {
    periods
      .iter()
      .filter(|period| {
        self.keeps_period(period)
      })
      .cloned()
      .collect()
  }

  #[must_use]
  pub fn apply_reminders(
    &self,
    reminders: &[Reminder]
  ) -> Vec<Reminder> {
    reminders
      .iter()
      .filter(|reminder| {
        self.keeps_reminder(reminder)
      })
      .cloned()
      .collect()
  }
}

fn shares_any(
  wanted: &BTreeSet<i64>,
  ids: &[i64]
) -> bool {
  wanted.is_empty()
    || ids
      .iter()
      .any(|id| wanted.contains(id))
}

fn matches_entity(
  wanted: &BTreeSet<EntityId>,
  entity: Option<EntityId>
) -> bool {
  wanted.is_empty()
    || entity
      .is_some_and(|id| wanted.contains(&id))
}
