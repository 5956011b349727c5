//! `SQLite` adapter for the onair durable audio cache.
#![deny(unsafe_code)]

pub mod repositories;
pub mod setup;

pub use repositories::SqliteCacheStore;

// Re-export setup functions for convenient access
pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
