//! Audio output devices.
//!
//! Two outputs exist per session: one reusable speech output that plays
//! synthesized chunks, and one music output for the background bed.
//!
//! Control methods are synchronous and return quickly. Completion is
//! reported asynchronously as [`OutputNotice`]s on a channel handed out by
//! the implementation's constructor. Every `load` bumps a generation
//! counter and notices carry the generation they belong to, so a listener
//! can discard notices from media that was already replaced.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{AudioHandle, MusicTrack};

/// Something the device reports on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The loaded media played to its end.
    Ended,
    /// The device paused without being asked to (e.g. an OS interruption).
    Paused,
    /// The device failed while playing.
    Error(String),
}

/// An [`OutputEvent`] tagged with the load generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNotice {
    pub generation: u64,
    pub event: OutputEvent,
}

impl OutputNotice {
    pub const fn new(generation: u64, event: OutputEvent) -> Self {
        Self { generation, event }
    }
}

/// Errors from output control calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Playback rejected: {0}")]
    Rejected(String),
}

/// Result of loading media into an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedMedia {
    pub generation: u64,
    /// Media duration when the decoder can tell.
    pub duration: Option<Duration>,
}

/// The single speech output reused for every chunk.
pub trait SpeechOutput: Send + Sync {
    /// Replace the current media. Any previous media is discarded.
    fn load(&self, clip: &AudioHandle) -> Result<LoadedMedia, OutputError>;

    /// Start or resume the loaded media.
    fn play(&self) -> Result<(), OutputError>;

    fn pause(&self) -> Result<(), OutputError>;

    /// Stop and discard the loaded media. Never fails.
    fn stop(&self);

    /// Playback rate multiplier.
    fn set_rate(&self, rate: f32);

    /// Linear gain, 0.0 to 1.0.
    fn set_volume(&self, volume: f32);
}

/// The background music output.
pub trait MusicOutput: Send + Sync {
    /// Replace the current track. Returns the new generation.
    fn load(&self, track: &MusicTrack, looping: bool) -> Result<u64, OutputError>;

    fn play(&self) -> Result<(), OutputError>;

    /// Stop and discard the current track. Never fails.
    fn stop(&self);

    /// Linear gain, 0.0 to 1.0.
    fn set_volume(&self, volume: f32);

    /// Current linear gain.
    fn volume(&self) -> f32;
}
