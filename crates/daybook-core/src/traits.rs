//! Core traits for daybook abstractions.
//!
//! These traits define the seams between the recall engine and its
//! collaborators (store, identity, media), enabling pluggable backends and
//! testability.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::calendar::DayMonthKey;
use crate::error::Result;
use crate::models::{AuthClaims, Entry, NewEntry, UpdateEntry, User};

// =============================================================================
// ENTRY STORE (READ SIDE)
// =============================================================================

/// Read-side store consumed by the recall engine.
///
/// Implementations return *normalized* entries for exactly one user. A store
/// may over-approximate a predicate (e.g. match legacy timestamp-only rows
/// by UTC bounds); the engine re-applies the authoritative filter on the
/// normalized rows, so results are observably identical across backends.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Entries filed under a local date within `[start, end]` (inclusive).
    async fn fetch_local_date_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>>;

    /// Entries whose day-month key matches, filed strictly before `before`.
    async fn fetch_day_month(
        &self,
        user_id: &str,
        key: DayMonthKey,
        before: NaiveDate,
    ) -> Result<Vec<Entry>>;
}

// =============================================================================
// ENTRY REPOSITORY (WRITE SIDE)
// =============================================================================

/// Repository for entry CRUD operations. All operations are user-scoped;
/// an id belonging to another user behaves as not-found.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Insert a new entry. Files it under today in the journal zone unless
    /// `local_date` back-fills an explicit past date; a future date is
    /// rejected with `InvalidInput`.
    async fn insert(&self, req: NewEntry) -> Result<Uuid>;

    /// Fetch one entry by id, scoped to its owner.
    async fn fetch(&self, user_id: &str, id: Uuid) -> Result<Entry>;

    /// Replace the caption and/or add/remove asset references.
    async fn update(&self, user_id: &str, id: Uuid, req: UpdateEntry) -> Result<()>;

    /// Permanently delete an entry. No tombstones.
    async fn delete(&self, user_id: &str, id: Uuid) -> Result<()>;
}

// =============================================================================
// USERS & IDENTITY
// =============================================================================

/// Repository for user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or refresh a user from verified claims.
    async fn upsert(&self, user: &User) -> Result<()>;

    /// Fetch a user by id.
    async fn fetch(&self, id: &str) -> Result<Option<User>>;
}

/// The identity collaborator: turns a presented bearer credential into a
/// verified set of claims, or fails.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<AuthClaims>;
}

// =============================================================================
// MEDIA STORE
// =============================================================================

/// A fetched media asset: upstream status, passthrough headers, and body.
#[derive(Debug)]
pub struct MediaAsset {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
    pub content_range: Option<String>,
    pub body: Vec<u8>,
}

/// Requested media variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaVariant {
    #[default]
    Thumbnail,
    Full,
}

impl MediaVariant {
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("full") => MediaVariant::Full,
            _ => MediaVariant::Thumbnail,
        }
    }
}

/// The binary asset collaborator: accepts uploads and serves bytes back by
/// opaque identifier.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload one asset, returning its opaque identifier.
    async fn upload_asset(
        &self,
        user_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String>;

    /// Fetch asset bytes, forwarding an optional HTTP `Range`.
    async fn fetch_asset(
        &self,
        asset_id: &str,
        variant: MediaVariant,
        range: Option<&str>,
    ) -> Result<MediaAsset>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_variant_from_param() {
        assert_eq!(MediaVariant::from_param(None), MediaVariant::Thumbnail);
        assert_eq!(MediaVariant::from_param(Some("thumbnail")), MediaVariant::Thumbnail);
        assert_eq!(MediaVariant::from_param(Some("full")), MediaVariant::Full);
        assert_eq!(MediaVariant::from_param(Some("FULL")), MediaVariant::Full);
        assert_eq!(MediaVariant::from_param(Some("garbage")), MediaVariant::Thumbnail);
    }
}
