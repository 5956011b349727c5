//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together:
//! - Durable cache store (via onair-db)
//! - Synthesis client and gateway (via onair-tts)
//! - Audio devices, driver, mixer and orchestrator (via onair-playback)
//!
//! Command handlers receive the composed [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use onair_core::{AudioCache, CacheConfig, PlaybackEvent};
use onair_db::SqliteCacheStore;
use onair_playback::device::open_default_outputs;
use onair_playback::{
    BackgroundMixer, ChannelObserver, DriverConfig, MixerConfig, PlaybackOrchestrator,
    SpeechDriver,
};
use onair_tts::{HttpSynthesisEndpoint, SynthesisGateway, TtsClientConfig};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::error::CliError;
use crate::paths::default_cache_db;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// SQLite file backing the durable cache.
    pub cache_db: PathBuf,
    pub cache: CacheConfig,
    /// Drop expired cache entries while starting up.
    pub sweep_on_start: bool,
}

impl CliConfig {
    /// Config with the default cache location unless `cache_db` is given.
    pub fn with_defaults(cache_db: Option<PathBuf>) -> Result<Self> {
        let cache_db = match cache_db {
            Some(path) => path,
            None => default_cache_db()?,
        };
        Ok(Self {
            cache_db,
            cache: CacheConfig::default(),
            sweep_on_start: true,
        })
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub cache: Arc<AudioCache>,
}

impl CliContext {
    /// Build an orchestrator on the default audio device.
    ///
    /// Events are delivered on the returned receiver until the orchestrator
    /// is dropped.
    pub fn orchestrator(
        &self,
        tts: &TtsClientConfig,
    ) -> Result<(PlaybackOrchestrator, UnboundedReceiver<PlaybackEvent>)> {
        let endpoint =
            HttpSynthesisEndpoint::new(tts).context("Failed to build the synthesis client")?;
        let gateway = Arc::new(SynthesisGateway::new(
            Arc::new(endpoint),
            Arc::clone(&self.cache),
        ));

        let outputs = open_default_outputs().map_err(|e| CliError::Device(e.to_string()))?;
        let driver = SpeechDriver::new(
            Arc::new(outputs.speech),
            outputs.speech_notices,
            DriverConfig::default(),
        );
        let mixer = BackgroundMixer::new(
            Arc::new(outputs.music),
            outputs.music_notices,
            MixerConfig::default(),
        );

        let (observer, events) = ChannelObserver::new();
        let orchestrator = PlaybackOrchestrator::new(gateway, driver, mixer, Arc::new(observer));
        Ok((orchestrator, events))
    }
}

/// Bootstrap the CLI application.
///
/// Opens the durable cache; if the store cannot be opened the cache runs in
/// memory only for this process.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let cache = match SqliteCacheStore::open(&config.cache_db).await {
        Ok(store) => AudioCache::with_store(Arc::new(store), config.cache),
        Err(e) => {
            warn!(
                path = %config.cache_db.display(),
                error = %e,
                "Audio cache store unavailable, caching in memory only"
            );
            AudioCache::memory_only(config.cache)
        }
    };

    if config.sweep_on_start {
        let removed = cache.sweep_expired().await;
        if removed > 0 {
            info!(removed, "Expired audio removed from cache");
        }
    }

    Ok(CliContext {
        cache: Arc::new(cache),
    })
}
