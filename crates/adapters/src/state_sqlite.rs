//! SQLite store implementation

use async_trait::async_trait;
use reecho_domain::{
    CredentialStore, Credentials, CriteriaStore, Criterion, PostId, StoreError, WatermarkStore,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;

/// SQLite-backed account and criteria store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and initialize if needed) the database at the given path
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                handle TEXT PRIMARY KEY,
                api_key TEXT NOT NULL,
                api_secret TEXT NOT NULL,
                watermark INTEGER,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS criteria (
                handle TEXT PRIMARY KEY,
                term TEXT NOT NULL,
                list_id TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

fn now_rfc3339() -> Result<String, StoreError> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn watermark_to_db(id: PostId) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn watermark_from_db(raw: Option<i64>) -> Result<Option<PostId>, StoreError> {
    raw.map(|v| PostId::try_from(v).map_err(|e| StoreError::Serialization(e.to_string())))
        .transpose()
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn credentials(&self, handle: &str) -> Result<Credentials, StoreError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT api_key, api_secret FROM accounts WHERE handle = ?")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((key, secret)) => Ok(Credentials {
                key: SecretString::new(key.into()),
                secret: SecretString::new(secret.into()),
            }),
            None => Err(StoreError::NotFound(handle.to_string())),
        }
    }

    async fn add_account(&self, handle: &str, credentials: Credentials) -> Result<(), StoreError> {
        // Re-authorization replaces credentials; the watermark survives so
        // the next cycle does not re-run the backfill guard.
        sqlx::query(
            r#"
            INSERT INTO accounts (handle, api_key, api_secret, watermark, updated_at)
            VALUES (?, ?, ?, NULL, ?)
            ON CONFLICT(handle) DO UPDATE SET
                api_key = excluded.api_key,
                api_secret = excluded.api_secret,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(handle)
        .bind(credentials.key.expose_secret())
        .bind(credentials.secret.expose_secret())
        .bind(now_rfc3339()?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT handle FROM accounts ORDER BY handle")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(handle,)| handle).collect())
    }
}

#[async_trait]
impl WatermarkStore for SqliteStore {
    async fn watermark(&self, handle: &str) -> Result<Option<PostId>, StoreError> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT watermark FROM accounts WHERE handle = ?")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            Some((raw,)) => watermark_from_db(raw),
            None => Err(StoreError::NotFound(handle.to_string())),
        }
    }

    async fn set_watermark(&self, handle: &str, id: PostId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET watermark = ?, updated_at = ? WHERE handle = ?")
            .bind(watermark_to_db(id)?)
            .bind(now_rfc3339()?)
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(handle.to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl CriteriaStore for SqliteStore {
    async fn list_all(&self) -> Result<Vec<Criterion>, StoreError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT handle, term, list_id FROM criteria ORDER BY handle")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(handle, term, list_id)| Criterion {
                handle,
                term,
                list_id,
            })
            .collect())
    }

    async fn get(&self, handle: &str) -> Result<Option<Criterion>, StoreError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT handle, term, list_id FROM criteria WHERE handle = ?")
                .bind(handle)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(row.map(|(handle, term, list_id)| Criterion {
            handle,
            term,
            list_id,
        }))
    }

    async fn upsert(&self, criterion: &Criterion) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO criteria (handle, term, list_id, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(handle) DO UPDATE SET
                term = excluded.term,
                list_id = excluded.list_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&criterion.handle)
        .bind(&criterion.term)
        .bind(&criterion.list_id)
        .bind(now_rfc3339()?)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, handle: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM criteria WHERE handle = ?")
            .bind(handle)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
