//! Persistent backing store for synthesized audio.
//!
//! The store is an optional second tier behind the in-memory handle map.
//! Every method is fallible; callers treat a failure as "store unavailable"
//! and keep working from memory.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// An audio record as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub key: String,
    pub data: Bytes,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Errors from a cache store.
#[derive(Debug, Clone, Error)]
pub enum CacheStoreError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache store quota exceeded")]
    QuotaExceeded,

    #[error("Corrupt cache record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Durable key/value store for audio records.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<StoredAudio>, CacheStoreError>;

    /// Insert or replace a record.
    async fn put(&self, record: &StoredAudio) -> Result<(), CacheStoreError>;

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError>;

    async fn count(&self) -> Result<usize, CacheStoreError>;

    /// Delete the `n` records with the oldest `created_at`. Returns how many were removed.
    async fn evict_oldest(&self, n: usize) -> Result<usize, CacheStoreError>;

    /// Delete every record created before `cutoff`. Returns how many were removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheStoreError>;

    async fn clear(&self) -> Result<(), CacheStoreError>;
}
