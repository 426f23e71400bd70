//! User repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use daybook_core::{Error, Result, Role, User, UserRepository};

fn user_from_row(row: &PgRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        avatar_url: row.get("avatar_url"),
        role: Role::from_claim(Some(&role)),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of UserRepository.
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn upsert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO journal_user (id, email, name, avatar_url, role, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               ON CONFLICT (id) DO UPDATE SET
                   email = EXCLUDED.email,
                   name = EXCLUDED.name,
                   avatar_url = EXCLUDED.avatar_url,
                   role = EXCLUDED.role,
                   updated_at = EXCLUDED.updated_at"#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "users",
            op = "upsert",
            user_id = %user.id,
            "User upserted"
        );
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, name, avatar_url, role, created_at, updated_at
             FROM journal_user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(user_from_row))
    }
}
