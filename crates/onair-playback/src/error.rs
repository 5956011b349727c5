//! Playback error types.

use onair_core::{OutputError, PlaybackPosition, SettingsError};
use onair_tts::SynthesisError;

/// Errors from playing a single item.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    /// The device failed and the automatic resume did not help.
    #[error("Playback failed: {0}")]
    Failure(String),

    /// A control call on the output was refused.
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Terminal error of a playback session.
///
/// A user-requested stop is not an error; it ends the session with
/// [`SessionOutcome::Stopped`](crate::SessionOutcome::Stopped).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("Invalid session settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("No chunk at position {0}")]
    InvalidPosition(PlaybackPosition),

    #[error("A playback session is already running")]
    Busy,

    /// A synthesis task panicked or was torn down underneath the session.
    #[error("Synthesis task failed: {0}")]
    TaskFailed(String),
}
