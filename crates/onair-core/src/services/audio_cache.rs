//! Content-addressed cache of synthesized audio.
//!
//! Two tiers: an in-memory handle map that lives as long as the process,
//! and an optional durable [`CacheStore`]. The durable tier is best effort.
//! The first store failure switches the cache to memory-only for the rest
//! of the process; `get` and `set` never fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{AudioClip, AudioHandle};
use crate::ports::{CacheStore, CacheStoreError, StoredAudio};

/// Default maximum number of cached clips.
pub const DEFAULT_MAX_ENTRIES: usize = 200;

/// Default time-to-live of a cached clip.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Separates voice and text in the hashed key material.
const KEY_SEPARATOR: u8 = 0x1f;

/// Cache sizing and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum entries per tier. Oldest entries are evicted first.
    pub max_entries: usize,
    /// Entries at least this old are treated as absent.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Derive the cache key for a (text, voice) pair.
///
/// Whitespace runs are collapsed before hashing so formatting-only
/// differences map to the same entry.
pub fn cache_key(text: &str, voice_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voice_id.as_bytes());
    hasher.update([KEY_SEPARATOR]);
    for (i, word) in text.split_whitespace().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(word.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    handle: AudioHandle,
    created_at: DateTime<Utc>,
}

/// Two-tier audio cache.
pub struct AudioCache {
    config: CacheConfig,
    ttl: TimeDelta,
    memory: Mutex<IndexMap<String, MemoryEntry>>,
    store: Option<Arc<dyn CacheStore>>,
    degraded: AtomicBool,
}

impl AudioCache {
    /// A cache without a durable tier.
    pub fn memory_only(config: CacheConfig) -> Self {
        Self::build(config, None)
    }

    /// A cache backed by a durable store.
    pub fn with_store(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self::build(config, Some(store))
    }

    fn build(config: CacheConfig, store: Option<Arc<dyn CacheStore>>) -> Self {
        let ttl = TimeDelta::from_std(config.ttl).unwrap_or(TimeDelta::MAX);
        Self {
            config: config.with_max_entries(config.max_entries.max(1)),
            ttl,
            memory: Mutex::new(IndexMap::new()),
            store,
            degraded: AtomicBool::new(false),
        }
    }

    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the durable tier was abandoned after a failure.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Number of handles held in memory.
    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Look up audio for `text` spoken by `voice_id`.
    pub async fn get(&self, text: &str, voice_id: &str) -> Option<AudioHandle> {
        let key = cache_key(text, voice_id);

        {
            let mut memory = self.memory.lock().await;
            if let Some(entry) = memory.get(&key) {
                if !self.is_expired(entry.created_at) {
                    return Some(Arc::clone(&entry.handle));
                }
                memory.shift_remove(&key);
            }
        }

        let store = self.live_store()?;
        match store.get(&key).await {
            Ok(Some(record)) if self.is_expired(record.created_at) => {
                debug!(key = %key, "Cached audio expired");
                if let Err(e) = store.delete(&key).await {
                    self.degrade(&e);
                }
                None
            }
            Ok(Some(record)) => {
                let handle = Arc::new(AudioClip::new(record.data, record.mime_type));
                self.remember(key, Arc::clone(&handle), record.created_at)
                    .await;
                Some(handle)
            }
            Ok(None) => None,
            Err(CacheStoreError::Corrupt { key, reason }) => {
                warn!(key = %key, reason = %reason, "Dropping corrupt cache record");
                if let Err(e) = store.delete(&key).await {
                    self.degrade(&e);
                }
                None
            }
            Err(e) => {
                self.degrade(&e);
                None
            }
        }
    }

    /// Store audio for `text` spoken by `voice_id` and return its handle.
    pub async fn set(&self, text: &str, voice_id: &str, clip: AudioClip) -> AudioHandle {
        let key = cache_key(text, voice_id);
        let created_at = Utc::now();
        let handle = Arc::new(clip);

        if let Some(store) = self.live_store() {
            if let Err(e) = self.persist(store, &key, &handle, created_at).await {
                self.degrade(&e);
            }
        }

        self.remember(key, Arc::clone(&handle), created_at).await;
        handle
    }

    /// Remove every entry from both tiers.
    ///
    /// Memory is always cleared; a store failure is returned to the caller.
    pub async fn clear(&self) -> Result<(), CacheStoreError> {
        self.memory.lock().await.clear();
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        info!("Audio cache cleared");
        Ok(())
    }

    /// Remove expired entries from both tiers. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = self.cutoff();

        let mut removed = {
            let mut memory = self.memory.lock().await;
            let before = memory.len();
            memory.retain(|_, entry| entry.created_at > cutoff);
            before - memory.len()
        };

        if let Some(store) = self.live_store() {
            match store.purge_older_than(cutoff).await {
                Ok(purged) => removed += purged,
                Err(e) => self.degrade(&e),
            }
        }

        info!(removed, "Swept expired audio cache entries");
        removed
    }

    async fn persist(
        &self,
        store: &dyn CacheStore,
        key: &str,
        handle: &AudioHandle,
        created_at: DateTime<Utc>,
    ) -> Result<(), CacheStoreError> {
        let count = store.count().await?;
        if count >= self.config.max_entries {
            let excess = count + 1 - self.config.max_entries;
            let evicted = store.evict_oldest(excess).await?;
            debug!(evicted, "Evicted oldest cache records");
        }

        store
            .put(&StoredAudio {
                key: key.to_string(),
                data: handle.data.clone(),
                mime_type: handle.mime_type.clone(),
                created_at,
            })
            .await
    }

    async fn remember(&self, key: String, handle: AudioHandle, created_at: DateTime<Utc>) {
        let mut memory = self.memory.lock().await;
        memory.shift_remove(&key);
        while memory.len() >= self.config.max_entries {
            memory.shift_remove_index(0);
        }
        memory.insert(key, MemoryEntry { handle, created_at });
    }

    fn live_store(&self) -> Option<&dyn CacheStore> {
        if self.is_degraded() {
            return None;
        }
        self.store.as_deref()
    }

    fn degrade(&self, error: &CacheStoreError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                error = %error,
                "Audio cache store unavailable, continuing with in-memory cache only"
            );
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn is_expired(&self, created_at: DateTime<Utc>) -> bool {
        created_at <= self.cutoff()
    }
}

impl std::fmt::Debug for AudioCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCache")
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("degraded", &self.is_degraded())
            .finish_non_exhaustive()
    }
}
