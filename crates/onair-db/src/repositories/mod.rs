//! Store implementations using `SQLite`.
//!
//! The `SqlitePool` is confined to this module and never exposed through
//! the port trait signatures.

mod sqlite_cache_store;

pub use sqlite_cache_store::SqliteCacheStore;
