//! Data directory resolution.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

const CACHE_DB_FILE: &str = "audio-cache.db";

/// Root directory for onair data.
///
/// `ONAIR_DATA_DIR` wins, otherwise `<local data dir>/onair`. The
/// directory is created if missing.
pub fn data_root() -> Result<PathBuf> {
    let root = match env::var_os("ONAIR_DATA_DIR") {
        Some(path) => PathBuf::from(path),
        None => dirs::data_local_dir()
            .context("Could not determine the local data directory")?
            .join("onair"),
    };
    fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create data directory {}", root.display()))?;
    Ok(root)
}

/// Default location of the durable audio cache.
pub fn default_cache_db() -> Result<PathBuf> {
    Ok(data_root()?.join(CACHE_DB_FILE))
}
