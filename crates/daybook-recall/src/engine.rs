//! The temporal recall engine.
//!
//! Each query is a pure function of `(user_id, bucket parameters, store
//! contents)`: validate the reference date, fetch candidates through the
//! [`EntryStore`], then filter, group, and rank in-process. The engine holds
//! no mutable state, so concurrent queries need no coordination beyond the
//! store's own pooling.
//!
//! The store may over-approximate a predicate (legacy rows matched by UTC
//! bounds); the filters applied here on normalized entries are authoritative,
//! which keeps every backend observably equivalent.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use daybook_core::calendar::month_date_range;
use daybook_core::{
    best_entry, CalendarDate, CalendarDay, CalendarZone, Entry, EntryStore, Result,
};

use crate::rollup::rollup_days;

/// Temporal bucketing and best-candidate selection over an [`EntryStore`].
pub struct RecallEngine<S: EntryStore> {
    store: S,
    zone: CalendarZone,
}

impl<S: EntryStore> RecallEngine<S> {
    pub fn new(store: S, zone: CalendarZone) -> Self {
        Self { store, zone }
    }

    pub fn zone(&self) -> &CalendarZone {
        &self.zone
    }

    /// All entries filed under one exact local day, oldest first.
    pub async fn entries_for_day(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Vec<Entry>> {
        let date = CalendarDate::new(year, month, day)?;
        let start = Instant::now();

        let mut entries = self
            .store
            .fetch_local_date_range(user_id, date.date(), date.date())
            .await?;
        entries.retain(|e| e.local_date == date.date());
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(
            subsystem = "recall",
            component = "engine",
            op = "entries_for_day",
            user_id = %user_id,
            local_date = %date,
            result_count = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Exact-day recall complete"
        );
        Ok(entries)
    }

    /// Best entry for the same day-of-month in each earlier month of the
    /// same year, ascending by month.
    ///
    /// Deliberately never crosses a year boundary: "this day, earlier this
    /// year" and "this day, in past years" partition history with no
    /// overlap.
    pub async fn same_day_previous_months(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Vec<Entry>> {
        let reference = CalendarDate::new(year, month, day)?;
        let start = Instant::now();

        if month == 1 {
            return Ok(Vec::new());
        }

        // Everything filed this year strictly before the reference month.
        let range_start = NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1st always exists");
        let range_end = NaiveDate::from_ymd_opt(year, month, 1)
            .expect("validated month start exists")
            - Duration::days(1);

        let candidates = self
            .store
            .fetch_local_date_range(user_id, range_start, range_end)
            .await?;
        let candidate_count = candidates.len();

        let mut buckets: BTreeMap<u32, Vec<Entry>> = BTreeMap::new();
        for entry in candidates {
            let d = entry.local_date;
            if d.year() == year && d.day() == day && d.month() < month {
                buckets.entry(d.month()).or_default().push(entry);
            }
        }

        let results: Vec<Entry> = buckets
            .into_values()
            .filter_map(best_entry)
            .collect();

        debug!(
            subsystem = "recall",
            component = "engine",
            op = "same_day_previous_months",
            user_id = %user_id,
            local_date = %reference,
            candidate_count,
            bucket_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Previous-months recall complete"
        );
        Ok(results)
    }

    /// Best entry for the same `(month, day)` in each year strictly before
    /// the reference date, ascending by year.
    pub async fn same_day_previous_years(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Vec<Entry>> {
        let reference = CalendarDate::new(year, month, day)?;
        let key = reference.day_month();
        let start = Instant::now();

        let candidates = self
            .store
            .fetch_day_month(user_id, key, reference.date())
            .await?;
        let candidate_count = candidates.len();

        let mut buckets: BTreeMap<i32, Vec<Entry>> = BTreeMap::new();
        for entry in candidates {
            if entry.day_month == key && entry.local_date < reference.date() {
                buckets.entry(entry.local_date.year()).or_default().push(entry);
            }
        }

        let results: Vec<Entry> = buckets
            .into_values()
            .filter_map(best_entry)
            .collect();

        debug!(
            subsystem = "recall",
            component = "engine",
            op = "same_day_previous_years",
            user_id = %user_id,
            local_date = %reference,
            candidate_count,
            bucket_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Previous-years recall complete"
        );
        Ok(results)
    }

    /// The single best entry of one exact local day, if any.
    pub async fn today_summary(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Option<Entry>> {
        let entries = self.entries_for_day(user_id, year, month, day).await?;
        Ok(best_entry(entries))
    }

    /// Day-level rollup rows for a whole month, ascending by date.
    pub async fn calendar_month(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<CalendarDay>> {
        let (first, last) = month_date_range(year, month)?;
        let start = Instant::now();

        let mut entries = self
            .store
            .fetch_local_date_range(user_id, first, last)
            .await?;
        entries.retain(|e| e.local_date >= first && e.local_date <= last);
        let candidate_count = entries.len();

        let rows = rollup_days(entries);

        debug!(
            subsystem = "recall",
            component = "engine",
            op = "calendar_month",
            user_id = %user_id,
            candidate_count,
            bucket_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Calendar rollup complete"
        );
        Ok(rows)
    }
}
