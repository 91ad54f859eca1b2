use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::AppError;

use super::hash_secret;

/// One credential record. Raw secrets never appear here: `secret_hash` is
/// hex(SHA-256(raw ++ admin_secret)) and is the only stored form.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TokenRecord {
    pub id: String,
    pub secret_hash: String,
    pub rate_limit: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenStore {
    pool: SqlitePool,
    /// Process-wide salt (the admin secret). Every hash comparison in this
    /// store, including revoke-by-secret, is made under this value.
    salt: String,
}

impl TokenStore {
    pub async fn connect(database_url: &str, salt: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        Ok(Self {
            pool,
            salt: salt.to_string(),
        })
    }

    /// Create the token table if this is a fresh database.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS tokens (
                   id          TEXT PRIMARY KEY,
                   secret_hash TEXT UNIQUE NOT NULL,
                   rate_limit  INTEGER NOT NULL,
                   created_at  TEXT NOT NULL
               )"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Liveness probe for /healthz.
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a new record, hashing `raw_secret` under the current salt.
    /// The caller holds the only copy of the raw secret; it is never stored.
    /// A duplicate identifier maps to `Conflict` via the primary-key
    /// constraint, so concurrent creates race safely in the database.
    pub async fn create(
        &self,
        id: &str,
        raw_secret: &str,
        rate_limit: u32,
    ) -> Result<TokenRecord, AppError> {
        let record = TokenRecord {
            id: id.to_string(),
            secret_hash: hash_secret(raw_secret, &self.salt),
            rate_limit,
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            "INSERT INTO tokens (id, secret_hash, rate_limit, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.id)
        .bind(&record.secret_hash)
        .bind(record.rate_limit)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_identifier(&self, id: &str) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, secret_hash, rate_limit, created_at FROM tokens WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_hashed_secret(
        &self,
        secret_hash: &str,
    ) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, secret_hash, rate_limit, created_at FROM tokens WHERE secret_hash = ?1",
        )
        .bind(secret_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list(&self) -> Result<Vec<TokenRecord>, AppError> {
        let rows = sqlx::query_as::<_, TokenRecord>(
            "SELECT id, secret_hash, rate_limit, created_at FROM tokens ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_rate_limit(
        &self,
        id: &str,
        rate_limit: u32,
    ) -> Result<TokenRecord, AppError> {
        let result = sqlx::query("UPDATE tokens SET rate_limit = ?1 WHERE id = ?2")
            .bind(rate_limit)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("token ID '{}'", id)));
        }
        self.find_by_identifier(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("token ID '{}'", id)))
    }

    /// Replace the stored hash with one derived from a fresh secret,
    /// preserving identifier, rate limit and creation time. Returns the raw
    /// secret exactly once.
    pub async fn rotate_secret(&self, id: &str) -> Result<String, AppError> {
        let raw_secret = super::generate_secret();
        let secret_hash = hash_secret(&raw_secret, &self.salt);

        let result = sqlx::query("UPDATE tokens SET secret_hash = ?1 WHERE id = ?2")
            .bind(&secret_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("token ID '{}'", id)));
        }
        Ok(raw_secret)
    }

    /// Revoke by identifier or by raw secret. Raw secrets are never stored,
    /// so the secret path re-derives the salted hash and compares against
    /// `secret_hash`.
    pub async fn delete_by_identifier_or_raw_secret(&self, value: &str) -> Result<(), AppError> {
        let candidate_hash = hash_secret(value, &self.salt);

        let result = sqlx::query("DELETE FROM tokens WHERE id = ?1 OR secret_hash = ?2")
            .bind(value)
            .bind(&candidate_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("token or ID".to_string()));
        }
        Ok(())
    }
}
