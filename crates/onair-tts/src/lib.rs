//! Speech synthesis for onair.
//!
//! - [`HttpSynthesisEndpoint`] talks to the remote synthesis service.
//! - [`SynthesisGateway`] adds normalization, caching, throttling and
//!   retries on top of any [`onair_core::SynthesisEndpoint`].

mod client;
mod config;
mod error;
mod gateway;
mod retry;
mod text;
mod throttle;

pub use client::HttpSynthesisEndpoint;
pub use config::{DEFAULT_BASE_URL, TtsClientConfig};
pub use error::{SynthesisError, SynthesisErrorKind, SynthesisResult};
pub use gateway::{SYNTHESIS_SPEED, SynthesisContext, SynthesisGateway};
pub use retry::RetryPolicy;
pub use text::normalize_for_speech;
pub use throttle::{DEFAULT_MIN_INTERVAL, RequestThrottle};
