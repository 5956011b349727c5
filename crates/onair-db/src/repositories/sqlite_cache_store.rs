//! `SQLite` implementation of the `CacheStore` trait.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use onair_core::{CacheStore, CacheStoreError, StoredAudio};

use crate::setup::setup_database;

/// `SQLITE_FULL`: the database or disk is full.
const SQLITE_FULL: &str = "13";

/// `SQLite` implementation of the `CacheStore` trait.
///
/// One row per clip, with `created_at` stored as Unix milliseconds so age
/// comparisons stay numeric.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Create a store over an already initialized pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file and return a store over it.
    pub async fn open(db_path: &Path) -> anyhow::Result<Self> {
        let pool = setup_database(db_path).await?;
        tracing::debug!(path = %db_path.display(), "Opened audio cache database");
        Ok(Self::new(pool))
    }
}

fn storage_error(e: sqlx::Error) -> CacheStoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(SQLITE_FULL) {
            return CacheStoreError::QuotaExceeded;
        }
    }
    CacheStoreError::Unavailable(e.to_string())
}

fn row_to_audio(row: &sqlx::sqlite::SqliteRow) -> Result<StoredAudio, CacheStoreError> {
    let key: String = row.try_get("key").map_err(storage_error)?;
    let corrupt = |reason: String| CacheStoreError::Corrupt {
        key: key.clone(),
        reason,
    };

    let data: Vec<u8> = row.try_get("data").map_err(|e| corrupt(e.to_string()))?;
    let mime_type: String = row
        .try_get("mime_type")
        .map_err(|e| corrupt(e.to_string()))?;
    let millis: i64 = row
        .try_get("created_at")
        .map_err(|e| corrupt(e.to_string()))?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| corrupt(format!("invalid timestamp {millis}")))?;

    Ok(StoredAudio {
        key: key.clone(),
        data: Bytes::from(data),
        mime_type,
        created_at,
    })
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<StoredAudio>, CacheStoreError> {
        let row = sqlx::query(
            "SELECT key, mime_type, data, created_at FROM audio_cache WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.as_ref().map(row_to_audio).transpose()
    }

    async fn put(&self, record: &StoredAudio) -> Result<(), CacheStoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO audio_cache (key, mime_type, data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.key)
        .bind(&record.mime_type)
        .bind(record.data.as_ref())
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        sqlx::query("DELETE FROM audio_cache WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(())
    }

    async fn count(&self) -> Result<usize, CacheStoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM audio_cache")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;
        let n: i64 = row.try_get("n").map_err(storage_error)?;

        Ok(n.max(0) as usize)
    }

    async fn evict_oldest(&self, n: usize) -> Result<usize, CacheStoreError> {
        if n == 0 {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM audio_cache WHERE key IN (
                SELECT key FROM audio_cache ORDER BY created_at ASC, key ASC LIMIT ?
            )
            "#,
        )
        .bind(i64::try_from(n).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheStoreError> {
        let result = sqlx::query("DELETE FROM audio_cache WHERE created_at <= ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn clear(&self) -> Result<(), CacheStoreError> {
        sqlx::query("DELETE FROM audio_cache")
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(())
    }
}
