//! Access token repository: the identity collaborator, backed by Postgres.
//!
//! Credentials are `dk_`-prefixed random strings, stored only as a sha256
//! hash plus a short display prefix. Verification is a hash lookup that
//! also touches last-used bookkeeping.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use daybook_core::{
    AccessToken, AuthClaims, CreateTokenRequest, CreateTokenResponse, Error, Result, Role,
    TokenVerifier,
};

/// Credential prefix; anything else is rejected before touching the store.
pub const TOKEN_PREFIX: &str = "dk_";

/// Characters of the credential retained in clear for listing/audit.
const DISPLAY_PREFIX_LEN: usize = 10;

/// PostgreSQL implementation of the access-token repository.
pub struct PgTokenRepository {
    pool: Pool<Postgres>,
}

impl PgTokenRepository {
    /// Create a new PgTokenRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Compute the at-rest hash of a credential.
    fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Generate a fresh credential: `dk_` + 32 random bytes, hex-encoded.
    fn generate_secret() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
    }

    /// Mint a new token. The credential is returned exactly once.
    pub async fn create_token(&self, req: CreateTokenRequest) -> Result<CreateTokenResponse> {
        let secret = Self::generate_secret();
        let hash = Self::hash_secret(&secret);
        let prefix: String = secret.chars().take(DISPLAY_PREFIX_LEN).collect();

        let id = Uuid::now_v7();
        let now = Utc::now();
        let expires_at = req.expires_in_days.map(|days| now + Duration::days(days));

        sqlx::query(
            r#"INSERT INTO access_token
                   (id, user_id, name, token_hash, token_prefix, role, expires_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(id)
        .bind(&req.user_id)
        .bind(&req.name)
        .bind(&hash)
        .bind(&prefix)
        .bind(req.role.as_str())
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "tokens",
            op = "create",
            user_id = %req.user_id,
            "Access token minted"
        );

        Ok(CreateTokenResponse {
            id,
            token: secret, // Only shown once
            token_prefix: prefix,
            name: req.name,
            expires_at,
            created_at: now,
        })
    }

    /// Validate a presented credential and touch its usage bookkeeping.
    ///
    /// Returns `None` for unknown, revoked, or expired credentials.
    pub async fn validate_token(&self, secret: &str) -> Result<Option<AccessToken>> {
        let hash = Self::hash_secret(secret);
        let now = Utc::now();

        let row = sqlx::query(
            r#"SELECT id, user_id, name, token_prefix, role, last_used_at,
                      use_count, is_active, expires_at, created_at
               FROM access_token
               WHERE token_hash = $1
                 AND is_active = TRUE
                 AND (expires_at IS NULL OR expires_at > $2)"#,
        )
        .bind(&hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(ref r) = row {
            let id: Uuid = r.get("id");
            sqlx::query(
                "UPDATE access_token
                 SET last_used_at = $1, use_count = use_count + 1
                 WHERE id = $2",
            )
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        }

        Ok(row.as_ref().map(token_from_row))
    }

    /// List tokens for a user (credentials are never recoverable).
    pub async fn list_tokens(&self, user_id: &str) -> Result<Vec<AccessToken>> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, name, token_prefix, role, last_used_at,
                      use_count, is_active, expires_at, created_at
               FROM access_token
               WHERE user_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(token_from_row).collect())
    }

    /// Revoke a token. Returns whether anything changed.
    pub async fn revoke_token(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE access_token SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

fn token_from_row(row: &PgRow) -> AccessToken {
    let role: String = row.get("role");
    AccessToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        token_prefix: row.get("token_prefix"),
        role: Role::from_claim(Some(&role)),
        last_used_at: row.get("last_used_at"),
        use_count: row.get("use_count"),
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TokenVerifier for PgTokenRepository {
    async fn verify(&self, credential: &str) -> Result<AuthClaims> {
        if !credential.starts_with(TOKEN_PREFIX) {
            return Err(Error::Unauthorized("unrecognized credential format".to_string()));
        }

        let token = self.validate_token(credential).await?.ok_or_else(|| {
            warn!(
                subsystem = "db",
                component = "tokens",
                op = "verify",
                "Rejected unknown, revoked, or expired credential"
            );
            Error::Unauthorized("invalid or expired credential".to_string())
        })?;

        // Pull profile fields so login upserts carry them.
        let row = sqlx::query("SELECT email, name, avatar_url FROM journal_user WHERE id = $1")
            .bind(&token.user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let (email, name, avatar_url) = match row {
            Some(r) => (r.get("email"), r.get("name"), r.get("avatar_url")),
            None => (None, None, None),
        };

        Ok(AuthClaims {
            user_id: token.user_id,
            email,
            name,
            avatar_url,
            role: token.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_secret_is_deterministic_and_tagged() {
        let a = PgTokenRepository::hash_secret("dk_abc");
        let b = PgTokenRepository::hash_secret("dk_abc");
        let c = PgTokenRepository::hash_secret("dk_abd");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256:"));
        assert_eq!(a.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_generated_secret_shape() {
        let secret = PgTokenRepository::generate_secret();
        assert!(secret.starts_with(TOKEN_PREFIX));
        assert_eq!(secret.len(), TOKEN_PREFIX.len() + 64);

        let other = PgTokenRepository::generate_secret();
        assert_ne!(secret, other);
    }
}
