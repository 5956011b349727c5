//! Synthesis gateway: one text chunk in, one playable audio handle out.
//!
//! Order of operations for every call:
//! 1. normalize the text
//! 2. serve from the audio cache when possible, or join a request for the
//!    same text and voice that is already in flight
//! 3. wait for a throttle slot
//! 4. call the endpoint, retrying rate limits, 5xx and network failures
//!    with exponential backoff
//! 5. cache the result under the normalized text

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use onair_core::{
    AudioCache, AudioClip, AudioHandle, SynthesisEndpoint, SynthesisRequest, SynthesizedAudio,
    cache_key,
};

use crate::error::{SynthesisError, SynthesisResult};
use crate::retry::RetryPolicy;
use crate::text::normalize_for_speech;
use crate::throttle::{DEFAULT_MIN_INTERVAL, RequestThrottle};

/// Speed sent to the service. The session's speed multiplier is applied at
/// playback, so cached audio does not depend on it.
pub const SYNTHESIS_SPEED: f32 = 1.0;

/// Per-program information forwarded with each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisContext {
    pub program_category: Option<String>,
}

impl SynthesisContext {
    pub const fn new(program_category: Option<String>) -> Self {
        Self { program_category }
    }
}

type InFlight = Arc<OnceCell<SynthesisResult<AudioHandle>>>;

/// Converts text chunks into audio handles.
pub struct SynthesisGateway {
    endpoint: Arc<dyn SynthesisEndpoint>,
    cache: Arc<AudioCache>,
    throttle: RequestThrottle,
    retry: RetryPolicy,
    /// Requests not yet settled, by cache key. Overlapping calls for the
    /// same key share one endpoint request.
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl SynthesisGateway {
    /// Create a gateway with the default throttle and retry policy.
    pub fn new(endpoint: Arc<dyn SynthesisEndpoint>, cache: Arc<AudioCache>) -> Self {
        Self {
            endpoint,
            cache,
            throttle: RequestThrottle::new(DEFAULT_MIN_INTERVAL),
            retry: RetryPolicy::default(),
            in_flight: Mutex::default(),
        }
    }

    /// Set the minimum spacing between two endpoint requests.
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.throttle = RequestThrottle::new(interval);
        self
    }

    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.cache
    }

    /// Synthesize `text` with `voice_id`.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        context: &SynthesisContext,
    ) -> SynthesisResult<AudioHandle> {
        let normalized = normalize_for_speech(text);
        if normalized.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        if let Some(handle) = self.cache.get(&normalized, voice_id).await {
            debug!(voice = voice_id, chars = normalized.len(), "Synthesis served from cache");
            return Ok(handle);
        }

        let key = cache_key(&normalized, voice_id);
        let cell = self.join_in_flight(&key);
        let request = SynthesisRequest {
            text: normalized,
            voice_id: voice_id.to_string(),
            speed: SYNTHESIS_SPEED,
            program_category: context.program_category.clone(),
        };

        // If the caller driving the request is dropped, the next waiter
        // takes over the initialization.
        let result = cell
            .get_or_init(|| self.fetch_and_cache(&request))
            .await
            .clone();
        self.settle_in_flight(&key, &cell);
        result
    }

    async fn fetch_and_cache(&self, request: &SynthesisRequest) -> SynthesisResult<AudioHandle> {
        // A request for this key may have settled between our cache miss
        // and joining the in-flight map.
        if let Some(handle) = self.cache.get(&request.text, &request.voice_id).await {
            return Ok(handle);
        }
        let audio = self.request_with_retry(request).await?;
        let clip = AudioClip::new(audio.data, audio.mime_type);
        Ok(self.cache.set(&request.text, &request.voice_id, clip).await)
    }

    fn join_in_flight(&self, key: &str) -> InFlight {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cell) = in_flight.get(key) {
            debug!("Joining synthesis request already in flight");
            return Arc::clone(cell);
        }
        let cell = InFlight::default();
        in_flight.insert(key.to_string(), Arc::clone(&cell));
        cell
    }

    fn settle_in_flight(&self, key: &str, cell: &InFlight) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, cell)) {
            in_flight.remove(key);
        }
    }

    /// Number of distinct requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn request_with_retry(
        &self,
        request: &SynthesisRequest,
    ) -> SynthesisResult<SynthesizedAudio> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let waited = self.throttle.acquire().await;
            debug!(
                attempt,
                throttled = ?waited,
                chars = request.text.len(),
                "Requesting synthesis"
            );

            match self.endpoint.synthesize(request).await {
                Ok(audio) => return Ok(audio),
                Err(e) if !e.is_retryable() => {
                    warn!(error = %e, "Synthesis request rejected");
                    return Err(SynthesisError::Rejected(e));
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %e, "Synthesis retries exhausted");
                    return Err(SynthesisError::RetriesExhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay = ?delay,
                        error = %e,
                        "Synthesis attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for SynthesisGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisGateway")
            .field("throttle", &self.throttle)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
