//! # daybook-db
//!
//! PostgreSQL database layer for daybook.
//!
//! This crate provides:
//! - Connection pool management
//! - The entry write repository and the read-side entry store
//! - User and access-token repositories
//! - Schema migrations (behind the `migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use daybook_core::{CalendarZone, NewEntry};
//! use daybook_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let zone = CalendarZone::from_name("Asia/Kolkata")?;
//!     let db = Database::connect("postgres://localhost/daybook", zone).await?;
//!
//!     let entry_id = db.entries.insert(NewEntry {
//!         user_id: "user_1".to_string(),
//!         caption: Some("first light".to_string()),
//!         media_asset_ids: vec![],
//!         local_date: None,
//!     }).await?;
//!
//!     println!("Created entry: {}", entry_id);
//!     Ok(())
//! }
//! ```

pub mod entries;
pub mod pool;
pub mod tokens;
pub mod users;

// Re-export core types
pub use daybook_core::*;

// Re-export repository implementations
pub use entries::{PgEntryRepository, PgEntryStore};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tokens::{PgTokenRepository, TOKEN_PREFIX};
pub use users::PgUserRepository;

/// Aggregated database handle: one pool, one repository per concern.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Entry repository for CRUD operations.
    pub entries: std::sync::Arc<PgEntryRepository>,
    /// Read-side entry store consumed by the recall engine.
    pub recall: std::sync::Arc<PgEntryStore>,
    /// User repository.
    pub users: std::sync::Arc<PgUserRepository>,
    /// Access-token repository (the identity collaborator).
    pub tokens: std::sync::Arc<PgTokenRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>, zone: CalendarZone) -> Self {
        Self {
            entries: std::sync::Arc::new(PgEntryRepository::new(pool.clone(), zone)),
            recall: std::sync::Arc::new(PgEntryStore::new(pool.clone(), zone)),
            users: std::sync::Arc::new(PgUserRepository::new(pool.clone())),
            tokens: std::sync::Arc::new(PgTokenRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(url: &str, zone: CalendarZone) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool, zone))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(
        url: &str,
        zone: CalendarZone,
        config: PoolConfig,
    ) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool, zone))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
