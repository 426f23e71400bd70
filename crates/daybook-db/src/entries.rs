//! Entry repository and read-side store implementations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use daybook_core::{
    CalendarZone, DayMonthKey, Entry, EntryRepository, EntryStore, Error, NewEntry, Result,
    StoredEntry, UpdateEntry,
};

/// Map a database row to the pre-normalization stored shape.
///
/// Every column that arrived in a later schema generation is nullable here;
/// [`StoredEntry::normalize`] collapses the generations into the canonical
/// read model.
fn stored_entry_from_row(row: &PgRow) -> StoredEntry {
    StoredEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        caption: row.get("caption"),
        media_asset_ids: row.get("media_asset_ids"),
        created_at: row.get("created_at"),
        local_date: row.get("local_date"),
        day_month: row.get("day_month"),
        updated_at: row.get("updated_at"),
    }
}

/// Normalize a batch of rows, logging how many were dropped as malformed.
fn normalize_rows(rows: Vec<PgRow>, zone: &CalendarZone, op: &str) -> Vec<Entry> {
    let total = rows.len();
    let entries: Vec<Entry> = rows
        .iter()
        .map(stored_entry_from_row)
        .filter_map(|stored| stored.normalize(zone))
        .collect();

    let skipped = total - entries.len();
    if skipped > 0 {
        debug!(
            subsystem = "db",
            component = "entries",
            op = %op,
            skipped_count = skipped,
            "Excluded malformed stored rows from recall"
        );
    }
    entries
}

const SELECT_COLUMNS: &str =
    "id, user_id, caption, media_asset_ids, created_at, local_date, day_month, updated_at";

// =============================================================================
// WRITE SIDE
// =============================================================================

/// PostgreSQL implementation of EntryRepository.
pub struct PgEntryRepository {
    pool: Pool<Postgres>,
    zone: CalendarZone,
}

impl PgEntryRepository {
    /// Create a new PgEntryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>, zone: CalendarZone) -> Self {
        Self { pool, zone }
    }

    async fn fetch_stored(&self, user_id: &str, id: Uuid) -> Result<Option<StoredEntry>> {
        let query = format!(
            "SELECT {} FROM entry WHERE id = $1 AND user_id = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(stored_entry_from_row))
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn insert(&self, req: NewEntry) -> Result<Uuid> {
        let today = self.zone.today();
        let local_date = match req.local_date {
            Some(date) if date > today => {
                return Err(Error::InvalidInput(format!(
                    "cannot create an entry for the future date {}",
                    date
                )));
            }
            Some(date) => date,
            None => today,
        };

        let id = Uuid::now_v7();
        let now = Utc::now();
        let day_month = DayMonthKey::of(local_date).to_string();
        let assets: Vec<Option<String>> = req.media_asset_ids.into_iter().map(Some).collect();

        sqlx::query(
            r#"INSERT INTO entry
                   (id, user_id, caption, media_asset_ids, created_at, local_date, day_month)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(&req.user_id)
        .bind(&req.caption)
        .bind(&assets)
        .bind(now)
        .bind(local_date)
        .bind(&day_month)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "entries",
            op = "insert",
            user_id = %req.user_id,
            entry_id = %id,
            local_date = %local_date,
            "Entry inserted"
        );
        Ok(id)
    }

    async fn fetch(&self, user_id: &str, id: Uuid) -> Result<Entry> {
        let stored = self
            .fetch_stored(user_id, id)
            .await?
            .ok_or(Error::EntryNotFound(id))?;
        stored
            .normalize(&self.zone)
            .ok_or(Error::EntryNotFound(id))
    }

    async fn update(&self, user_id: &str, id: Uuid, req: UpdateEntry) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let query = format!(
            "SELECT {} FROM entry WHERE id = $1 AND user_id = $2 FOR UPDATE",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntryNotFound(id))?;
        let stored = stored_entry_from_row(&row);

        // Caption replaces wholesale when provided; assets append in upload
        // order and are removed by value, order of the remainder preserved.
        let caption = req.caption.or(stored.caption);
        let mut assets = stored.media_asset_ids;
        assets.extend(req.add_asset_ids.into_iter().map(Some));
        if !req.remove_asset_ids.is_empty() {
            assets.retain(|slot| match slot.as_deref() {
                Some(asset) => !req.remove_asset_ids.iter().any(|r| r.as_str() == asset),
                None => true,
            });
        }

        sqlx::query(
            "UPDATE entry SET caption = $3, media_asset_ids = $4, updated_at = $5
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(&caption)
        .bind(&assets)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "entries",
            op = "update",
            user_id = %user_id,
            entry_id = %id,
            "Entry updated"
        );
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM entry WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::EntryNotFound(id));
        }

        debug!(
            subsystem = "db",
            component = "entries",
            op = "delete",
            user_id = %user_id,
            entry_id = %id,
            "Entry deleted"
        );
        Ok(())
    }
}

// =============================================================================
// READ SIDE
// =============================================================================

/// PostgreSQL implementation of EntryStore.
///
/// Canonical rows match on their `local_date` / `day_month` columns. Rows
/// from the timestamp-only era match through the UTC instant bounds of the
/// requested local range instead, then normalization derives their calendar
/// keys; the recall engine's own filters are authoritative on the result.
pub struct PgEntryStore {
    pool: Pool<Postgres>,
    zone: CalendarZone,
}

impl PgEntryStore {
    /// Create a new PgEntryStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>, zone: CalendarZone) -> Self {
        Self { pool, zone }
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn fetch_local_date_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>> {
        let start_utc: DateTime<Utc> = self.zone.day_start(start);
        let end_utc: DateTime<Utc> = self.zone.day_end(end);

        let query = format!(
            r#"SELECT {}
               FROM entry
               WHERE user_id = $1
                 AND (local_date BETWEEN $2 AND $3
                      OR (local_date IS NULL AND created_at BETWEEN $4 AND $5))
               ORDER BY created_at"#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .bind(start_utc)
            .bind(end_utc)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(normalize_rows(rows, &self.zone, "fetch_local_date_range"))
    }

    async fn fetch_day_month(
        &self,
        user_id: &str,
        key: DayMonthKey,
        before: NaiveDate,
    ) -> Result<Vec<Entry>> {
        let before_utc: DateTime<Utc> = self.zone.day_start(before);

        // Legacy rows carry no day_month; anything created before the
        // reference day's start is a candidate and the engine re-filters on
        // the normalized key.
        let query = format!(
            r#"SELECT {}
               FROM entry
               WHERE user_id = $1
                 AND ((day_month = $2 AND local_date < $3)
                      OR (day_month IS NULL AND created_at < $4))
               ORDER BY created_at"#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(key.to_string())
            .bind(before)
            .bind(before_utc)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(normalize_rows(rows, &self.zone, "fetch_day_month"))
    }
}
