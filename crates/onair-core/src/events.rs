//! Playback events published to observers.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag so UI layers can switch on it:
//!
//! ```json
//! { "type": "state_changed", "state": "playing" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::SectionKind;

/// Externally visible state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No session is running.
    Idle,
    /// Waiting for the current chunk's audio.
    Buffering,
    /// Speech is audible.
    Playing,
    /// Paused by the user.
    Paused,
    /// Stopped by the user.
    Stopped,
    /// Every chunk was played.
    Ended,
    /// The session ended with a fatal error.
    Error,
}

impl PlaybackState {
    /// Whether the session is over.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Ended | Self::Error)
    }
}

/// Metadata describing the chunk that is playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub section_index: usize,
    pub chunk_index: usize,
    /// Cumulative index across the whole program.
    pub linear_index: usize,
    /// Total chunk count of the program.
    pub total: usize,
    pub section_kind: SectionKind,
    pub section_title: String,
    /// Display title, e.g. `"Tech news (2/5)"`.
    pub title: String,
}

/// Event emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// The session state changed.
    StateChanged {
        state: PlaybackState,
    },

    /// A new chunk started.
    NowPlaying(NowPlaying),

    /// A fatal error ended the session.
    Error {
        message: String,
    },
}

impl PlaybackEvent {
    pub const fn state(state: PlaybackState) -> Self {
        Self::StateChanged { state }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
