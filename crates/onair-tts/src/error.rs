//! Synthesis errors surfaced by the gateway.
//!
//! Retryable endpoint failures never leave the gateway on their own; once
//! the attempt budget is spent they are reported as
//! [`SynthesisError::RetriesExhausted`], which is fatal to a session.

use onair_core::EndpointError;
use thiserror::Error;

/// Result type alias for synthesis operations.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Coarse classification of a synthesis failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynthesisErrorKind {
    /// HTTP 429 on every attempt.
    RateLimited,
    /// 5xx on the last attempt.
    TransientServer,
    /// Transport failure on the last attempt.
    Network,
    /// Not retryable: other 4xx, unusable response, or nothing to speak.
    FatalRequest,
}

/// A synthesis call that could not produce audio.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// Every attempt failed with a retryable error.
    #[error("Synthesis failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        /// Error from the final attempt
        last: EndpointError,
    },

    /// The endpoint rejected the request.
    #[error("Synthesis rejected: {0}")]
    Rejected(EndpointError),

    /// The text was empty after normalization.
    #[error("Nothing to synthesize after text normalization")]
    EmptyText,
}

impl SynthesisError {
    pub const fn kind(&self) -> SynthesisErrorKind {
        match self {
            Self::RetriesExhausted { last, .. } => match last {
                EndpointError::RateLimited => SynthesisErrorKind::RateLimited,
                EndpointError::Server { .. } => SynthesisErrorKind::TransientServer,
                EndpointError::Network(_) => SynthesisErrorKind::Network,
                EndpointError::Request { .. } | EndpointError::InvalidResponse(_) => {
                    SynthesisErrorKind::FatalRequest
                }
            },
            Self::Rejected(_) | Self::EmptyText => SynthesisErrorKind::FatalRequest,
        }
    }
}
