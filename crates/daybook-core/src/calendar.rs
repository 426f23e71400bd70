//! Calendar key derivation for temporal recall.
//!
//! Every entry is filed under a *local calendar date*: the date its creation
//! instant falls on in the journal's configured IANA timezone. This module
//! converts between absolute UTC instants and local calendar keys, and
//! computes the UTC instant range `[start, end]` covered by a local day or
//! month.
//!
//! The zone is an explicit [`CalendarZone`] value threaded through every
//! call site rather than a process-wide constant, so per-user zones remain a
//! non-breaking extension.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Default journal timezone when `JOURNAL_TIMEZONE` is unset.
pub const DEFAULT_JOURNAL_TIMEZONE: &str = "Asia/Kolkata";

/// The last representable instant of a local day: `23:59:59.999999999`.
const END_OF_DAY_NANOS: u32 = 999_999_999;

// =============================================================================
// CALENDAR DATE
// =============================================================================

/// A validated local calendar date.
///
/// Construction rejects non-existent dates (Feb 30, day 31 of a 30-day
/// month, month 0 or 13) instead of clamping. All recall queries validate
/// their reference date through this type before any store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Validate `(year, month, day)` as an existing calendar date.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{:04}-{:02}-{:02} is not a valid calendar date",
                    year, month, day
                ))
            })
    }

    /// Wrap an already-valid date.
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// The year-independent `(month, day)` projection of this date.
    pub fn day_month(&self) -> DayMonthKey {
        DayMonthKey::of(self.0)
    }
}

impl std::fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

// =============================================================================
// DAY-MONTH KEY
// =============================================================================

/// Year-independent `(month, day)` key, stored and serialized as `"MM-DD"`.
///
/// Used to find "this day" across years without scanning every stored date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayMonthKey {
    pub month: u32,
    pub day: u32,
}

impl DayMonthKey {
    /// Validate a raw `(month, day)` pair.
    ///
    /// Day 29-31 is accepted here since the key is year-independent; whether
    /// the day exists in a *specific* month/year is [`CalendarDate`]'s job.
    pub fn new(month: u32, day: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(Error::InvalidInput(format!(
                "{:02}-{:02} is not a valid day-month key",
                month, day
            )));
        }
        Ok(Self { month, day })
    }

    /// Project the key out of a date. Pure: the stored `day_month` column
    /// must always equal `DayMonthKey::of(local_date)`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl std::fmt::Display for DayMonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

impl std::str::FromStr for DayMonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (m, d) = s
            .split_once('-')
            .ok_or_else(|| Error::InvalidInput(format!("malformed day-month key: {}", s)))?;
        let month: u32 = m
            .parse()
            .map_err(|_| Error::InvalidInput(format!("malformed day-month key: {}", s)))?;
        let day: u32 = d
            .parse()
            .map_err(|_| Error::InvalidInput(format!("malformed day-month key: {}", s)))?;
        Self::new(month, day)
    }
}

impl serde::Serialize for DayMonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for DayMonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CALENDAR ZONE
// =============================================================================

/// The journal's calendar zone.
///
/// Wraps a tzdb zone and derives every local calendar key from it. Bound
/// computation goes through zoned arithmetic, not fixed offsets, so the
/// contract holds in DST-observing zones as well as the DST-free default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarZone {
    tz: Tz,
}

impl CalendarZone {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Resolve a zone by IANA name (e.g. `"Asia/Kolkata"`).
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| Error::Config(format!("unknown IANA timezone: {}", name)))
    }

    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    /// Project an absolute instant onto this zone's calendar.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Today's local calendar date.
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    /// UTC instant of local midnight at the start of `date`.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight always exists");
        self.resolve_earliest(midnight).with_timezone(&Utc)
    }

    /// UTC instant of the last local instant of `date`.
    pub fn day_end(&self, date: NaiveDate) -> DateTime<Utc> {
        let last = date
            .and_hms_nano_opt(23, 59, 59, END_OF_DAY_NANOS)
            .expect("end of day always exists");
        self.resolve_latest(last).with_timezone(&Utc)
    }

    /// Inclusive UTC bounds `[start, end]` of one local calendar day.
    pub fn day_bounds(&self, date: CalendarDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.day_start(date.date()), self.day_end(date.date()))
    }

    /// Inclusive UTC bounds `[start, end]` of a whole local calendar month.
    pub fn month_bounds(&self, year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let (first, last) = month_date_range(year, month)?;
        Ok((self.day_start(first), self.day_end(last)))
    }

    /// Map a local wall-clock time to a zoned instant, taking the earliest
    /// candidate. A time skipped by a DST gap resolves to the first valid
    /// instant after the gap.
    fn resolve_earliest(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                // DST gaps are at most a handful of hours wide; probe forward
                // in half-hour steps until the wall clock exists again.
                let mut probe = naive;
                loop {
                    probe += Duration::minutes(30);
                    if let Some(dt) = self.tz.from_local_datetime(&probe).earliest() {
                        return dt;
                    }
                }
            }
        }
    }

    /// Map a local wall-clock time to a zoned instant, taking the latest
    /// candidate. A time skipped by a DST gap resolves to the last valid
    /// instant before the gap.
    fn resolve_latest(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(_, latest) => latest,
            LocalResult::None => {
                let mut probe = naive;
                loop {
                    probe -= Duration::minutes(30);
                    if let Some(dt) = self.tz.from_local_datetime(&probe).latest() {
                        return dt;
                    }
                }
            }
        }
    }
}

impl Default for CalendarZone {
    fn default() -> Self {
        Self::from_name(DEFAULT_JOURNAL_TIMEZONE).expect("default timezone is in the tzdb")
    }
}

/// First and last calendar day of `(year, month)`, validating the month.
pub fn month_date_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidInput(format!("{:04}-{:02} is not a valid month", year, month)))?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::InvalidInput(format!("{:04}-{:02} is not a valid month", year, month)))?;
    Ok((first, next_first - Duration::days(1)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn kolkata() -> CalendarZone {
        CalendarZone::from_name("Asia/Kolkata").unwrap()
    }

    fn new_york() -> CalendarZone {
        CalendarZone::from_name("America/New_York").unwrap()
    }

    #[test]
    fn test_calendar_date_rejects_nonexistent_dates() {
        assert!(CalendarDate::new(2024, 2, 30).is_err());
        assert!(CalendarDate::new(2024, 4, 31).is_err());
        assert!(CalendarDate::new(2024, 13, 1).is_err());
        assert!(CalendarDate::new(2024, 0, 1).is_err());
        assert!(CalendarDate::new(2023, 2, 29).is_err());
    }

    #[test]
    fn test_calendar_date_accepts_leap_day() {
        let date = CalendarDate::new(2024, 2, 29).unwrap();
        assert_eq!(date.day_month(), DayMonthKey { month: 2, day: 29 });
    }

    #[test]
    fn test_day_bounds_fixed_offset_zone() {
        // Asia/Kolkata is UTC+05:30 year-round.
        let zone = kolkata();
        let date = CalendarDate::new(2024, 3, 9).unwrap();
        let (start, end) = zone.day_bounds(date);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 8, 18, 30, 0).unwrap());
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2024, 3, 9, 18, 29, 59).unwrap()
                + Duration::nanoseconds(END_OF_DAY_NANOS as i64)
        );
    }

    #[test]
    fn test_day_bounds_project_back_onto_same_date() {
        let zone = kolkata();
        let date = CalendarDate::new(2025, 1, 1).unwrap();
        let (start, end) = zone.day_bounds(date);

        assert_eq!(zone.local_date(start), date.date());
        assert_eq!(zone.local_date(end), date.date());
    }

    #[test]
    fn test_day_bounds_across_dst_spring_forward() {
        // 2024-03-10 in America/New_York is 23 hours long (02:00 -> 03:00).
        let zone = new_york();
        let date = CalendarDate::new(2024, 3, 10).unwrap();
        let (start, end) = zone.day_bounds(date);

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap());
        assert_eq!(zone.local_date(start), date.date());
        assert_eq!(zone.local_date(end), date.date());
        // Next local midnight is back on UTC-04:00.
        let next = zone.day_start(date.date() + Duration::days(1));
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 4, 0, 0).unwrap());
        assert!(end < next);
    }

    #[test]
    fn test_day_bounds_across_dst_fall_back() {
        // 2024-11-03 in America/New_York is 25 hours long.
        let zone = new_york();
        let date = CalendarDate::new(2024, 11, 3).unwrap();
        let (start, end) = zone.day_bounds(date);

        let span = end - start;
        assert_eq!(span.num_hours(), 24); // 25h minus the final nanosecond truncation
        assert_eq!(zone.local_date(start), date.date());
        assert_eq!(zone.local_date(end), date.date());
    }

    #[test]
    fn test_month_bounds_february_leap_year() {
        let zone = kolkata();
        let (start, end) = zone.month_bounds(2024, 2).unwrap();

        assert_eq!(zone.local_date(start), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(zone.local_date(end), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_month_bounds_rejects_invalid_month() {
        let zone = kolkata();
        assert!(zone.month_bounds(2024, 0).is_err());
        assert!(zone.month_bounds(2024, 13).is_err());
    }

    #[test]
    fn test_local_date_projection() {
        let zone = kolkata();
        // 2024-03-08T20:00Z is already 2024-03-09 01:30 in Kolkata.
        let instant = Utc.with_ymd_and_hms(2024, 3, 8, 20, 0, 0).unwrap();
        assert_eq!(zone.local_date(instant), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn test_day_start_is_local_midnight() {
        let zone = kolkata();
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let start_local = zone.day_start(date).with_timezone(&chrono_tz::Asia::Kolkata);
        assert_eq!(start_local.hour(), 0);
        assert_eq!(start_local.minute(), 0);
        assert_eq!(start_local.date_naive(), date);
    }

    #[test]
    fn test_day_month_key_display_and_parse() {
        let key = DayMonthKey::new(3, 9).unwrap();
        assert_eq!(key.to_string(), "03-09");
        assert_eq!("03-09".parse::<DayMonthKey>().unwrap(), key);
        assert_eq!("12-31".parse::<DayMonthKey>().unwrap(), DayMonthKey { month: 12, day: 31 });
    }

    #[test]
    fn test_day_month_key_rejects_out_of_range() {
        assert!(DayMonthKey::new(0, 1).is_err());
        assert!(DayMonthKey::new(13, 1).is_err());
        assert!(DayMonthKey::new(1, 0).is_err());
        assert!(DayMonthKey::new(1, 32).is_err());
        assert!("13-01".parse::<DayMonthKey>().is_err());
        assert!("0309".parse::<DayMonthKey>().is_err());
    }

    #[test]
    fn test_day_month_key_of_matches_date() {
        let date = NaiveDate::from_ymd_opt(2022, 12, 5).unwrap();
        assert_eq!(DayMonthKey::of(date), DayMonthKey { month: 12, day: 5 });
    }

    #[test]
    fn test_zone_from_name_rejects_unknown() {
        assert!(CalendarZone::from_name("Not/AZone").is_err());
    }
}
