//! Day-level rollup for the month calendar view.
//!
//! The calendar does not need one canonical entry per day; it needs a
//! presence/thumbnail signal. So instead of picking a winner, the rollup
//! unions signals across every entry of a day: caption-presence is an OR
//! over the whole group, and the thumbnail is the first real asset reference
//! found scanning the day's entries oldest-first.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use daybook_core::{CalendarDay, Entry};

/// Collapse entries into one summary row per calendar day.
///
/// Rows come back in ascending date order; days with no entries produce no
/// row at all. Within a day, entries are scanned in ascending `created_at`
/// (id as tiebreaker) with each entry's internal asset order preserved, and
/// the first non-null, non-empty asset id becomes the representative.
pub fn rollup_days(entries: Vec<Entry>) -> Vec<CalendarDay> {
    let mut groups: BTreeMap<NaiveDate, Vec<Entry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.local_date).or_default().push(entry);
    }

    groups
        .into_iter()
        .map(|(date, mut group)| {
            group.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

            let has_caption = group.iter().any(Entry::has_caption);
            let representative_asset_id = group
                .iter()
                .flat_map(|e| e.present_asset_ids())
                .next()
                .map(String::from);

            CalendarDay {
                date,
                has_entries: true,
                has_caption,
                representative_asset_id,
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use daybook_core::DayMonthKey;
    use uuid::Uuid;

    fn entry(
        date: (i32, u32, u32),
        hour: u32,
        caption: Option<&str>,
        assets: Vec<Option<&str>>,
    ) -> Entry {
        let local_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        Entry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: caption.map(String::from),
            media_asset_ids: assets.into_iter().map(|a| a.map(String::from)).collect(),
            created_at: Utc
                .with_ymd_and_hms(date.0, date.1, date.2, hour, 0, 0)
                .unwrap(),
            local_date,
            day_month: DayMonthKey::of(local_date),
            updated_at: None,
        }
    }

    #[test]
    fn test_empty_input_yields_no_rows() {
        assert!(rollup_days(vec![]).is_empty());
    }

    #[test]
    fn test_caption_presence_is_set_level_or() {
        // One captioned, one bare entry on the same day.
        let rows = rollup_days(vec![
            entry((2024, 5, 3), 8, None, vec![]),
            entry((2024, 5, 3), 19, Some("evening walk"), vec![]),
        ]);

        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_caption);
        assert!(rows[0].has_entries);
    }

    #[test]
    fn test_whitespace_captions_do_not_mark_the_day() {
        let rows = rollup_days(vec![
            entry((2024, 5, 3), 8, Some("   "), vec![]),
            entry((2024, 5, 3), 19, None, vec![]),
        ]);

        assert!(!rows[0].has_caption);
    }

    #[test]
    fn test_representative_scans_oldest_entry_first() {
        // Entry A (earlier, assets [null, "x"]) and B (later, ["y"]): the
        // null slot is skipped and "x" wins over the later entry's "y".
        let rows = rollup_days(vec![
            entry((2024, 5, 3), 21, None, vec![Some("y")]),
            entry((2024, 5, 3), 7, None, vec![None, Some("x")]),
        ]);

        assert_eq!(rows[0].representative_asset_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_representative_absent_when_day_has_no_assets() {
        let rows = rollup_days(vec![
            entry((2024, 5, 3), 7, Some("words only"), vec![None]),
            entry((2024, 5, 3), 9, None, vec![]),
        ]);

        assert_eq!(rows[0].representative_asset_id, None);
    }

    #[test]
    fn test_one_row_per_day_ascending() {
        let rows = rollup_days(vec![
            entry((2024, 5, 20), 9, None, vec![Some("c")]),
            entry((2024, 5, 3), 7, None, vec![Some("a")]),
            entry((2024, 5, 3), 9, None, vec![Some("b")]),
        ]);

        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            ]
        );
        assert_eq!(rows[0].representative_asset_id.as_deref(), Some("a"));
        assert_eq!(rows[1].representative_asset_id.as_deref(), Some("c"));
    }
}
