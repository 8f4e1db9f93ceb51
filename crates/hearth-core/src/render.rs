use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::bucket::AllDateBuckets;
use crate::config::Config;
use crate::datetime::DaySpan;
use crate::ingest::Skipped;
use crate::lanes::PlacedPeriods;
use crate::model::{ScheduledTask, TaskSchedule, endpoint_zones};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, buckets))]
    pub fn print_agenda(&self, buckets: &AllDateBuckets, local: Tz) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_agenda(out, buckets, local)
    }

    pub fn write_agenda<W: Write>(
        &self,
        writer: W,
        buckets: &AllDateBuckets,
        local: Tz,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Day".to_string(),
            "Kind".to_string(),
            "When".to_string(),
            "Title".to_string(),
            "Members".to_string(),
        ];

        let mut rows = Vec::new();
        for (day, bucket) in buckets.iter() {
            let day_label = self.paint(&day.as_key(), "33");

            if bucket.is_empty() {
                rows.push(vec![
                    day_label.clone(),
                    "-".to_string(),
                    String::new(),
                    "(nothing planned)".to_string(),
                    String::new(),
                ]);
                continue;
            }

            for task in &bucket.tasks {
                let title = if task.is_complete {
                    self.paint(&task.title, "2")
                } else {
                    task.title.clone()
                };
                rows.push(vec![
                    day_label.clone(),
                    task.kind.as_resourcetype().to_string(),
                    task_when(task, local),
                    title,
                    join_ids(&task.members),
                ]);
            }

            for period in &bucket.periods {
                let when = if period.is_one_day() {
                    "one day".to_string()
                } else {
                    format!("{}..{}", period.start, period.end)
                };
                rows.push(vec![
                    day_label.clone(),
                    period.kind.as_resourcetype().to_string(),
                    when,
                    self.paint(&period.title, "36"),
                    join_ids(&period.members),
                ]);
            }

            for reminder in &bucket.reminders {
                rows.push(vec![
                    day_label.clone(),
                    "Reminder".to_string(),
                    format!("{}..{}", reminder.start, reminder.end),
                    self.paint(&reminder.title, "35"),
                    join_ids(&reminder.members),
                ]);
            }
        }

        write_table(writer, headers, rows)
    }

    #[tracing::instrument(skip(self, placed))]
    pub fn print_lanes(&self, placed: &PlacedPeriods) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_lanes(out, placed)
    }

    pub fn write_lanes<W: Write>(&self, writer: W, placed: &PlacedPeriods) -> anyhow::Result<()> {
        let headers = vec![
            "Day".to_string(),
            "Lane".to_string(),
            "Title".to_string(),
            "Span".to_string(),
            "Color".to_string(),
        ];

        let mut rows = Vec::new();
        for (day, entries) in placed.iter() {
            for entry in entries {
                rows.push(vec![
                    self.paint(&day.as_key(), "33"),
                    entry.lane.to_string(),
                    entry.period.title.clone(),
                    format!("{}..{}", entry.period.start, entry.period.end),
                    entry.color.to_string(),
                ]);
            }
        }

        write_table(writer, headers, rows)
    }

    pub fn print_days(&self, span: &DaySpan) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for day in span {
            writeln!(out, "{day}")?;
        }
        Ok(())
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn print_skipped(&self, skipped: &[Skipped]) -> anyhow::Result<()> {
        if skipped.is_empty() {
            return Ok(());
        }
        let mut err = io::stderr().lock();
        let ids = skipped
            .iter()
            .map(|s| match s.id {
                Some(id) => format!("{:?} {id}", s.record).to_lowercase(),
                None => format!("{:?} without id", s.record).to_lowercase(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(
            err,
            "skipped {} record(s) with unusable dates: {ids}",
            skipped.len()
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn task_when(task: &ScheduledTask, local: Tz) -> String {
    match &task.schedule {
        TaskSchedule::Timed {
            start,
            end,
            start_timezone,
            end_timezone,
        } => {
            let (start_tz, end_tz) = endpoint_zones(*start_timezone, *end_timezone, local);
            format!(
                "{}-{}",
                start.with_timezone(&start_tz).format("%H:%M"),
                end.with_timezone(&end_tz).format("%H:%M")
            )
        }
        TaskSchedule::AnyTime {
            duration_minutes, ..
        } => {
            if *duration_minutes == 0 {
                "any time".to_string()
            } else {
                format!("any time ({duration_minutes}m)")
            }
        }
        TaskSchedule::AllDay { .. } => "all day".to_string(),
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ", width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
