//! Port definitions (trait abstractions) for external systems.
//!
//! # Design Rules
//!
//! - No `sqlx`, `reqwest` or `rodio` types in any signature
//! - Implementations live in adapter crates (`onair-db`, `onair-tts`, `onair-playback`)

pub mod audio_output;
pub mod cache_store;
pub mod observer;
pub mod synthesis;

pub use audio_output::{
    LoadedMedia, MusicOutput, OutputError, OutputEvent, OutputNotice, SpeechOutput,
};
pub use cache_store::{CacheStore, CacheStoreError, StoredAudio};
pub use observer::{NoopObserver, PlaybackObserver};
pub use synthesis::{EndpointError, SynthesisEndpoint, SynthesisRequest, SynthesizedAudio};
