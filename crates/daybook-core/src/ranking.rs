//! Best-entry selection for recall buckets.
//!
//! When several entries share a bucket (a day, a month, a year) exactly one
//! is surfaced. The order is a strict total order, best first:
//!
//! 1. has media before no media
//! 2. has caption before no caption
//! 3. earlier `created_at` before later (the first entry logged that day is
//!    canonical when richness is tied)
//! 4. `id` as the final tiebreaker, so identical timestamps still order
//!    deterministically
//!
//! The functions here are pure and insensitive to input order; both
//! in-process grouping and any store-side group-and-rank implementation must
//! agree with them observably.

use std::cmp::Ordering;

use crate::models::Entry;

/// Compare two entries, best first.
pub fn compare_best_first(a: &Entry, b: &Entry) -> Ordering {
    b.has_media()
        .cmp(&a.has_media())
        .then_with(|| b.has_caption().cmp(&a.has_caption()))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a bucket in place, best entry first.
pub fn sort_best_first(entries: &mut [Entry]) {
    entries.sort_by(compare_best_first);
}

/// Select the best entry of a bucket.
///
/// Returns `None` only for an empty input; for any non-empty input the
/// result is a member of the input set.
pub fn best_entry<I>(entries: I) -> Option<Entry>
where
    I: IntoIterator<Item = Entry>,
{
    entries.into_iter().min_by(compare_best_first)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DayMonthKey;
    use chrono::{NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn entry(caption: Option<&str>, assets: Vec<&str>, hour: u32) -> Entry {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 9, hour, 0, 0).unwrap();
        let local_date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        Entry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: caption.map(String::from),
            media_asset_ids: assets.into_iter().map(|a| Some(a.to_string())).collect(),
            created_at,
            local_date,
            day_month: DayMonthKey::of(local_date),
            updated_at: None,
        }
    }

    #[test]
    fn test_media_beats_caption() {
        let with_media = entry(None, vec!["a1"], 12);
        let with_caption = entry(Some("a long day"), vec![], 6);

        let best = best_entry(vec![with_caption, with_media.clone()]).unwrap();
        assert_eq!(best.id, with_media.id);
    }

    #[test]
    fn test_caption_beats_bare_entry() {
        let bare = entry(None, vec![], 6);
        let with_caption = entry(Some("a long day"), vec![], 12);

        let best = best_entry(vec![bare, with_caption.clone()]).unwrap();
        assert_eq!(best.id, with_caption.id);
    }

    #[test]
    fn test_oldest_wins_when_richness_tied() {
        let morning = entry(Some("sunrise"), vec!["a1"], 7);
        let evening = entry(Some("sunset"), vec!["a2"], 19);

        let best = best_entry(vec![evening, morning.clone()]).unwrap();
        assert_eq!(best.id, morning.id);
    }

    #[test]
    fn test_best_is_member_of_input_and_idempotent() {
        let entries = vec![
            entry(None, vec![], 5),
            entry(Some("words"), vec![], 9),
            entry(None, vec!["a1"], 13),
        ];

        let winner = best_entry(entries.clone()).unwrap();
        assert!(entries.iter().any(|e| e.id == winner.id));

        // Re-ranking the singleton {winner} yields winner.
        let again = best_entry(vec![winner.clone()]).unwrap();
        assert_eq!(again.id, winner.id);
    }

    #[test]
    fn test_order_insensitive() {
        let mut entries = vec![
            entry(None, vec![], 5),
            entry(Some("words"), vec![], 9),
            entry(None, vec!["a1"], 13),
            entry(Some("both"), vec!["a2"], 14),
        ];

        let forward = best_entry(entries.clone()).unwrap();
        entries.reverse();
        let backward = best_entry(entries).unwrap();
        assert_eq!(forward.id, backward.id);
    }

    #[test]
    fn test_identical_instants_break_ties_on_id() {
        let mut a = entry(None, vec![], 8);
        let mut b = entry(None, vec![], 8);
        // Force a known id order without depending on v4 luck.
        a.id = Uuid::from_u128(1);
        b.id = Uuid::from_u128(2);

        let best = best_entry(vec![b.clone(), a.clone()]).unwrap();
        assert_eq!(best.id, a.id);
        let best = best_entry(vec![a.clone(), b]).unwrap();
        assert_eq!(best.id, a.id);
    }

    #[test]
    fn test_empty_input_yields_none() {
        assert!(best_entry(Vec::<Entry>::new()).is_none());
    }

    #[test]
    fn test_sort_best_first_full_order() {
        let both = entry(Some("both"), vec!["a1"], 12);
        let media_only = entry(None, vec!["a2"], 12);
        let caption_only = entry(Some("words"), vec![], 12);
        let bare = entry(None, vec![], 12);

        let mut entries = vec![bare.clone(), caption_only.clone(), media_only.clone(), both.clone()];
        sort_best_first(&mut entries);

        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![both.id, media_only.id, caption_only.id, bare.id]);
    }
}
