//! Core domain types, ports, and services for the onair playback engine.
//!
//! This crate has no knowledge of HTTP, SQLite or audio devices; those live
//! behind the traits in [`ports`] and are implemented by adapter crates.
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod services;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    AudioClip, AudioHandle, Chunk, FlatChunk, FlatProgram, MusicTrack, PlaybackPosition, Program,
    Section, SectionKind,
};
pub use events::{NowPlaying, PlaybackEvent, PlaybackState};
pub use ports::{
    CacheStore, CacheStoreError, EndpointError, LoadedMedia, MusicOutput, NoopObserver,
    OutputError, OutputEvent, OutputNotice, PlaybackObserver, SpeechOutput, StoredAudio,
    SynthesisEndpoint, SynthesisRequest, SynthesizedAudio,
};
pub use services::{AudioCache, CacheConfig, cache_key};
pub use settings::{MusicLibrary, SessionSettings, SettingsError, validate_settings};

// Used by integration tests only
#[cfg(test)]
use mockall as _;
