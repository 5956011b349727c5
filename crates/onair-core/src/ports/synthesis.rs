//! Remote speech synthesis endpoint.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// One synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Normalized text to speak.
    pub text: String,
    pub voice_id: String,
    /// Rendering speed requested from the service.
    pub speed: f32,
    /// Category hint forwarded to the service.
    pub program_category: Option<String>,
}

/// Encoded audio returned by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub data: Bytes,
    pub mime_type: String,
}

/// Failure of a single synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("Rate limited by synthesis service")]
    RateLimited,

    #[error("Synthesis service error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Synthesis request rejected (HTTP {status}): {message}")]
    Request { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid synthesis response: {0}")]
    InvalidResponse(String),
}

impl EndpointError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::Server { status, message },
            _ => Self::Request { status, message },
        }
    }

    /// Whether another attempt may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Server { .. } | Self::Network(_)
        )
    }
}

/// Speech synthesis service.
#[async_trait]
pub trait SynthesisEndpoint: Send + Sync {
    /// Perform one synthesis attempt. Retrying is the caller's concern.
    async fn synthesize(&self, request: &SynthesisRequest)
    -> Result<SynthesizedAudio, EndpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(EndpointError::from_status(429, "slow down"), EndpointError::RateLimited);
        assert!(matches!(
            EndpointError::from_status(503, "busy"),
            EndpointError::Server { status: 503, .. }
        ));
        assert!(matches!(
            EndpointError::from_status(400, "bad"),
            EndpointError::Request { status: 400, .. }
        ));
    }

    #[test]
    fn retryable_errors() {
        assert!(EndpointError::RateLimited.is_retryable());
        assert!(EndpointError::Network("reset".into()).is_retryable());
        assert!(EndpointError::from_status(502, "").is_retryable());
        assert!(!EndpointError::from_status(404, "").is_retryable());
        assert!(!EndpointError::InvalidResponse("bad base64".into()).is_retryable());
    }
}
