//! CLI-specific error types and exit codes.

use onair_playback::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Bad flags or settings.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The program file could not be read or parsed.
    #[error("Program error: {0}")]
    Program(String),

    /// Audio device could not be opened.
    #[error("Audio device error: {0}")]
    Device(String),

    /// The synthesis service failed a chunk.
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Playback ended with an error.
    #[error("Playback error: {0}")]
    Playback(String),
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Arguments(_) => 2,
            Self::Program(_) => 65,   // EX_DATAERR
            Self::Synthesis(_) => 69, // EX_UNAVAILABLE
            Self::Device(_) => 71,    // EX_OSERR
            Self::Playback(_) => 1,
        }
    }
}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidSettings(_) | SessionError::InvalidPosition(_) => {
                Self::Arguments(err.to_string())
            }
            SessionError::Synthesis(e) => Self::Synthesis(e.to_string()),
            SessionError::Playback(_) | SessionError::Busy | SessionError::TaskFailed(_) => {
                Self::Playback(err.to_string())
            }
        }
    }
}
