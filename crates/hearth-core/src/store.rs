use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono_tz::Tz;
use hearth_api::CalendarSnapshotDto;
use tracing::info;

use crate::bucket::{AllDateBuckets, BucketOptions, bucket_entries};
use crate::filter::CalendarFilter;
use crate::ingest::{Ingested, Skipped, ingest, ingest_json};
use crate::lanes::{LaneColor, PeriodSelection, PlacedPeriods, place_overlapping_periods};
use crate::memo::Memo;
use crate::model::{Period, Reminder, ScheduledTask};

type BucketInputs = (
    Vec<ScheduledTask>,
    Vec<Period>,
    Vec<Reminder>,
    BucketOptions,
    CalendarFilter,
);

type PlacementInputs = (Vec<Period>, LaneColor, PeriodSelection, CalendarFilter);

/// Calendar records for one session. Owned by the caller and passed by
/// reference; derived views are memoized per selector.
#[derive(Debug)]
pub struct CalendarStore {
    local_timezone: Tz,
    tasks: Vec<ScheduledTask>,
    periods: Vec<Period>,
    reminders: Vec<Reminder>,
    skipped: Vec<Skipped>,
    buckets: Memo<BucketInputs, AllDateBuckets>,
    placements: Memo<PlacementInputs, PlacedPeriods>,
}

impl CalendarStore {
    #[tracing::instrument(skip(snapshot))]
    pub fn from_snapshot(snapshot: &CalendarSnapshotDto, local_timezone: Tz) -> Self {
        Self::from_ingested(ingest(snapshot, local_timezone), local_timezone)
    }

    /// Reads a snapshot file. Records are decoded one at a time, so a
    /// malformed record ends up in `skipped` instead of failing the load.
    #[tracing::instrument(skip(path))]
    pub fn load(path: &Path, local_timezone: Tz) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let ingested = ingest_json(&text, local_timezone)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;

        let store = Self::from_ingested(ingested, local_timezone);
        info!(
            file = %path.display(),
            tasks = store.tasks.len(),
            periods = store.periods.len(),
            reminders = store.reminders.len(),
            skipped = store.skipped.len(),
            "loaded calendar snapshot"
        );
        Ok(store)
    }

    fn from_ingested(ingested: Ingested, local_timezone: Tz) -> Self {
        Self {
            local_timezone,
            tasks: ingested.tasks,
            periods: ingested.periods,
            reminders: ingested.reminders,
            skipped: ingested.skipped,
            buckets: Memo::new(),
            placements: Memo::new(),
        }
    }

    pub fn local_timezone(&self) -> Tz {
        self.local_timezone
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    pub fn replace_periods(&mut self, periods: Vec<Period>) {
        self.periods = periods;
    }

    pub fn bucket_options(
        &self,
        always_include_today: bool,
        now: chrono::DateTime<chrono::Utc>,
    ) -> BucketOptions {
        BucketOptions::new(self.local_timezone, always_include_today, now)
    }

    /// Day buckets for the current records; recomputed only when the
    /// records, options or filter differ from the previous call.
    pub fn day_buckets(
        &mut self,
        options: &BucketOptions,
        filter: &CalendarFilter,
    ) -> &AllDateBuckets {
        let inputs = (
            self.tasks.clone(),
            self.periods.clone(),
            self.reminders.clone(),
            *options,
            filter.clone(),
        );
        self.buckets
            .get_or_compute(inputs, |(tasks, periods, reminders, options, filter)| {
                bucket_entries(
                    &filter.apply_tasks(tasks),
                    &filter.apply_periods(periods),
                    &filter.apply_reminders(reminders),
                    options,
                )
            })
    }

    pub fn placed_periods(
        &mut self,
        color: &LaneColor,
        selection: PeriodSelection,
        filter: &CalendarFilter,
    ) -> &PlacedPeriods {
        let inputs = (self.periods.clone(), color.clone(), selection, filter.clone());
        self.placements
            .get_or_compute(inputs, |(periods, color, selection, filter)| {
                place_overlapping_periods(&filter.apply_periods(periods), color, *selection)
            })
    }

    pub fn memo_stats(&self) -> (u64, u64) {
        (
            self.buckets.hits() + self.placements.hits(),
            self.buckets.misses() + self.placements.misses(),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use hearth_api::{PeriodDto, ReminderDto};

    use super::*;
    use crate::datetime::CalendarDay;
    use crate::model::PeriodKind;

    fn snapshot() -> CalendarSnapshotDto {
        CalendarSnapshotDto {
            tasks: vec![],
            periods: vec![PeriodDto {
                id: 1,
                title: "Easter holidays".to_string(),
                resourcetype: "SchoolBreak".to_string(),
                start_date: Some("2024-03-29".to_string()),
                end_date: Some("2024-04-12".to_string()),
                entity: Some(3),
                members: vec![1, 2],
            }],
            reminders: vec![ReminderDto {
                id: 2,
                title: "Pack swim kit".to_string(),
                start_date: Some("2024-04-01".to_string()),
                end_date: Some("2024-04-01".to_string()),
                entity: None,
                members: vec![2],
                is_complete: false,
            }],
        }
    }

    #[test]
    fn selectors_reuse_results_until_records_change() {
        let mut store = CalendarStore::from_snapshot(&snapshot(), chrono_tz::UTC);
        let now = Utc
            .with_ymd_and_hms(2024, 4, 1, 8, 0, 0)
            .single()
            .expect("valid now");
        let options = store.bucket_options(true, now);
        let filter = CalendarFilter::default();

        let first = store.day_buckets(&options, &filter).clone();
        let second = store.day_buckets(&options, &filter).clone();
        assert_eq!(first, second);
        assert_eq!(first.len(), 15);
        assert_eq!(store.memo_stats(), (1, 1));

        let extra = Period {
            id: 9,
            title: "Sports day".to_string(),
            kind: PeriodKind::Period,
            start: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
            end: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
            entity: None,
            members: vec![],
        };
        let mut periods = store.periods().to_vec();
        periods.push(extra);
        store.replace_periods(periods);

        let third = store.day_buckets(&options, &filter);
        assert_eq!(third.len(), 16);
        let may_first: CalendarDay = "2024-05-01".parse().expect("valid day");
        assert!(third.get(may_first).is_some());
        assert_eq!(store.memo_stats(), (1, 2));
    }

    #[test]
    fn filter_changes_invalidate_placements() {
        let mut store = CalendarStore::from_snapshot(&snapshot(), chrono_tz::UTC);
        let color = LaneColor::parse("#336699").expect("valid color");

        let everyone = CalendarFilter::default();
        let all = store
            .placed_periods(&color, PeriodSelection::All, &everyone)
            .clone();
        assert_eq!(all.lane_count(), 1);

        let only_third_member = CalendarFilter {
            members: [7].into_iter().collect(),
            ..CalendarFilter::default()
        };
        let none = store.placed_periods(&color, PeriodSelection::All, &only_third_member);
        assert!(none.is_empty());
        assert_eq!(store.memo_stats(), (0, 2));
    }
}
