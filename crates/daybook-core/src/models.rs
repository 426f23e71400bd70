//! Core data types for daybook.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{CalendarZone, DayMonthKey};

// =============================================================================
// ENTRY READ MODEL
// =============================================================================

/// A journal entry as consumed by the recall engine.
///
/// `local_date` is the calendar date the entry is filed under in the journal
/// zone; `day_month` is always the pure `(month, day)` projection of it.
/// Both are canonical here; storage-format differences are resolved by
/// [`StoredEntry::normalize`] before an `Entry` ever exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Entry {
    pub id: Uuid,
    /// Owner; every recall query is scoped to exactly one user.
    pub user_id: String,
    pub caption: Option<String>,
    /// Opaque media asset references in upload order. Legacy rows may carry
    /// null elements; they count as absent.
    pub media_asset_ids: Vec<Option<String>>,
    /// Creation instant; immutable, sole ordering tiebreaker.
    pub created_at: DateTime<Utc>,
    pub local_date: NaiveDate,
    #[schema(value_type = String, example = "03-09")]
    pub day_month: DayMonthKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// True iff the caption is non-empty after trimming whitespace.
    pub fn has_caption(&self) -> bool {
        self.caption
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false)
    }

    /// True iff at least one asset reference is present and non-empty.
    pub fn has_media(&self) -> bool {
        self.media_asset_ids
            .iter()
            .any(|id| id.as_deref().map(|s| !s.is_empty()).unwrap_or(false))
    }

    /// Asset references with null/empty slots filtered out, order preserved.
    pub fn present_asset_ids(&self) -> impl Iterator<Item = &str> {
        self.media_asset_ids
            .iter()
            .filter_map(|id| id.as_deref())
            .filter(|s| !s.is_empty())
    }
}

// =============================================================================
// STORED ENTRY (VERSIONED-SCHEMA ADAPTER)
// =============================================================================

/// An entry row as it exists on disk, before normalization.
///
/// The store has carried two conventions over its life: early rows only have
/// `created_at`, later rows also persist `local_date` and `day_month`. This
/// shape admits both; [`StoredEntry::normalize`] collapses them into the one
/// canonical [`Entry`] the bucketing code sees. Bucketing never branches on
/// storage format.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: Uuid,
    pub user_id: String,
    pub caption: Option<String>,
    pub media_asset_ids: Vec<Option<String>>,
    pub created_at: Option<DateTime<Utc>>,
    pub local_date: Option<NaiveDate>,
    pub day_month: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    /// Normalize a stored row into the canonical read model.
    ///
    /// Missing `local_date` is derived from `created_at` under `zone`;
    /// `day_month` is always recomputed from the resolved date, so the
    /// consistency invariant holds even if the stored string drifted. A row
    /// with no `created_at` cannot be ranked and is dropped with a warning,
    /// since one bad historical record must not break recall of every other
    /// day.
    pub fn normalize(self, zone: &CalendarZone) -> Option<Entry> {
        let Some(created_at) = self.created_at else {
            tracing::warn!(
                entry_id = %self.id,
                user_id = %self.user_id,
                "Stored entry has no creation instant; excluded from recall"
            );
            return None;
        };

        let local_date = self.local_date.unwrap_or_else(|| zone.local_date(created_at));

        Some(Entry {
            id: self.id,
            user_id: self.user_id,
            caption: self.caption,
            media_asset_ids: self.media_asset_ids,
            created_at,
            local_date,
            day_month: DayMonthKey::of(local_date),
            updated_at: self.updated_at,
        })
    }
}

// =============================================================================
// CALENDAR ROLLUP ROW
// =============================================================================

/// One calendar-view row: a day-level summary over *all* entries of that day.
///
/// Unlike best-entry selection this unions signals across the day, since the
/// calendar only needs a presence/thumbnail signal, not a canonical entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub has_entries: bool,
    pub has_caption: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_asset_id: Option<String>,
}

// =============================================================================
// WRITE-SIDE REQUESTS
// =============================================================================

/// Request for creating an entry.
///
/// `local_date: None` files the entry under today in the journal zone;
/// `Some(date)` back-fills a historical entry (the repository rejects future
/// dates at write time).
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_id: String,
    pub caption: Option<String>,
    pub media_asset_ids: Vec<String>,
    pub local_date: Option<NaiveDate>,
}

/// Request for updating an entry.
///
/// `caption: Some(_)` replaces the caption wholesale; asset ids are appended
/// and removed by value. Identity, creation instant, and calendar keys are
/// immutable.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntry {
    pub caption: Option<String>,
    pub add_asset_ids: Vec<String>,
    pub remove_asset_ids: Vec<String>,
}

// =============================================================================
// USERS & AUTH
// =============================================================================

/// User role, defaulting to `User` on unknown or absent claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn from_claim(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// A journal user, upserted from verified claims at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build the upsert shape from verified claims.
    pub fn from_claims(claims: &AuthClaims) -> Self {
        let now = Utc::now();
        Self {
            id: claims.user_id.clone(),
            email: claims.email.clone(),
            name: claims.name.clone().or_else(|| claims.email.clone()),
            avatar_url: claims.avatar_url.clone(),
            role: claims.role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Verified claims produced by the token-verification collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthClaims {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// A stored access token (credential hash at rest, never the credential).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// First characters of the credential, kept for listing/audit.
    pub token_prefix: String,
    pub role: Role,
    pub last_used_at: Option<DateTime<Utc>>,
    pub use_count: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Access token creation request.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CreateTokenRequest {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    pub expires_in_days: Option<i64>,
}

/// Access token creation response (includes the credential, shown only once).
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct CreateTokenResponse {
    pub id: Uuid,
    pub token: String,
    pub token_prefix: String,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(caption: Option<&str>, assets: Vec<Option<&str>>) -> Entry {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        let local_date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        Entry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: caption.map(String::from),
            media_asset_ids: assets.into_iter().map(|a| a.map(String::from)).collect(),
            created_at,
            local_date,
            day_month: DayMonthKey::of(local_date),
            updated_at: None,
        }
    }

    #[test]
    fn test_has_caption_requires_non_whitespace() {
        assert!(entry(Some("went hiking"), vec![]).has_caption());
        assert!(!entry(Some("   \t\n"), vec![]).has_caption());
        assert!(!entry(Some(""), vec![]).has_caption());
        assert!(!entry(None, vec![]).has_caption());
    }

    #[test]
    fn test_has_media_ignores_null_and_empty_slots() {
        assert!(entry(None, vec![Some("a1")]).has_media());
        assert!(entry(None, vec![None, Some("a1")]).has_media());
        assert!(!entry(None, vec![None, Some("")]).has_media());
        assert!(!entry(None, vec![]).has_media());
    }

    #[test]
    fn test_present_asset_ids_preserves_order() {
        let e = entry(None, vec![None, Some("x"), Some(""), Some("y")]);
        let ids: Vec<&str> = e.present_asset_ids().collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_normalize_prefers_stored_local_date() {
        let zone = CalendarZone::default();
        // Back-filled entry: created today, filed under an explicit past date.
        let created_at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        let filed = NaiveDate::from_ymd_opt(2022, 7, 4).unwrap();
        let stored = StoredEntry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: None,
            media_asset_ids: vec![],
            created_at: Some(created_at),
            local_date: Some(filed),
            day_month: Some("07-04".to_string()),
            updated_at: None,
        };

        let e = stored.normalize(&zone).unwrap();
        assert_eq!(e.local_date, filed);
        assert_eq!(e.day_month, DayMonthKey { month: 7, day: 4 });
    }

    #[test]
    fn test_normalize_derives_local_date_for_legacy_rows() {
        let zone = CalendarZone::default();
        // 20:00 UTC is already past midnight in Asia/Kolkata.
        let created_at = Utc.with_ymd_and_hms(2024, 3, 8, 20, 0, 0).unwrap();
        let stored = StoredEntry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: Some("legacy".to_string()),
            media_asset_ids: vec![Some("a".to_string())],
            created_at: Some(created_at),
            local_date: None,
            day_month: None,
            updated_at: None,
        };

        let e = stored.normalize(&zone).unwrap();
        assert_eq!(e.local_date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(e.day_month, DayMonthKey { month: 3, day: 9 });
    }

    #[test]
    fn test_normalize_recomputes_drifted_day_month() {
        let zone = CalendarZone::default();
        let filed = NaiveDate::from_ymd_opt(2023, 5, 2).unwrap();
        let stored = StoredEntry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: None,
            media_asset_ids: vec![],
            created_at: Some(Utc.with_ymd_and_hms(2023, 5, 2, 4, 0, 0).unwrap()),
            local_date: Some(filed),
            day_month: Some("12-25".to_string()), // corrupt
            updated_at: None,
        };

        let e = stored.normalize(&zone).unwrap();
        assert_eq!(e.day_month, DayMonthKey::of(filed));
    }

    #[test]
    fn test_normalize_drops_rows_without_created_at() {
        let zone = CalendarZone::default();
        let stored = StoredEntry {
            id: Uuid::new_v4(),
            user_id: "user_1".to_string(),
            caption: Some("broken".to_string()),
            media_asset_ids: vec![],
            created_at: None,
            local_date: Some(NaiveDate::from_ymd_opt(2023, 5, 2).unwrap()),
            day_month: None,
            updated_at: None,
        };

        assert!(stored.normalize(&zone).is_none());
    }

    #[test]
    fn test_role_from_claim() {
        assert_eq!(Role::from_claim(Some("admin")), Role::Admin);
        assert_eq!(Role::from_claim(Some("ADMIN")), Role::Admin);
        assert_eq!(Role::from_claim(Some("user")), Role::User);
        assert_eq!(Role::from_claim(Some("banana")), Role::User);
        assert_eq!(Role::from_claim(None), Role::User);
    }

    #[test]
    fn test_user_from_claims_falls_back_to_email_for_name() {
        let claims = AuthClaims {
            user_id: "user_9".to_string(),
            email: Some("p@example.com".to_string()),
            name: None,
            avatar_url: None,
            role: Role::User,
        };
        let user = User::from_claims(&claims);
        assert_eq!(user.name.as_deref(), Some("p@example.com"));
    }
}
