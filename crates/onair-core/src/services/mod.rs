//! Core services that orchestrate between ports and domain logic.

mod audio_cache;

pub use audio_cache::{AudioCache, CacheConfig, DEFAULT_MAX_ENTRIES, DEFAULT_TTL, cache_key};
