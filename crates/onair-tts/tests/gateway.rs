//! Synthesis gateway: caching, throttling and retry behaviour.
//!
//! All tests run on a paused clock so backoff and throttle waits are exact.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use onair_core::{
    AudioCache, CacheConfig, EndpointError, SynthesisEndpoint, SynthesisRequest, SynthesizedAudio,
};
use onair_tts::{
    RetryPolicy, SynthesisContext, SynthesisError, SynthesisErrorKind, SynthesisGateway,
};
use tokio::time::Instant;

// ── Scripted endpoint ──────────────────────────────────────────────

/// Endpoint that replays a script of outcomes and records each call.
///
/// Once the script runs out every call succeeds.
#[derive(Default)]
struct ScriptedEndpoint {
    script: Mutex<VecDeque<Result<(), EndpointError>>>,
    calls: Mutex<Vec<(Instant, SynthesisRequest)>>,
    delay: Duration,
}

impl ScriptedEndpoint {
    fn with_script(script: impl IntoIterator<Item = Result<(), EndpointError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::default(),
            delay: Duration::ZERO,
        })
    }

    fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slow(
        delay: Duration,
        script: impl IntoIterator<Item = Result<(), EndpointError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::default(),
            delay,
        })
    }

    fn always_failing(error: EndpointError, times: usize) -> Arc<Self> {
        Self::with_script(std::iter::repeat_n(Err(error), times))
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn requests(&self) -> Vec<SynthesisRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl SynthesisEndpoint for ScriptedEndpoint {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, EndpointError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));

        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        next.map(|()| SynthesizedAudio {
            data: Bytes::from(format!("audio:{}", request.text)),
            mime_type: "audio/mpeg".to_string(),
        })
    }
}

fn gateway(endpoint: Arc<ScriptedEndpoint>) -> SynthesisGateway {
    let cache = Arc::new(AudioCache::memory_only(CacheConfig::default()));
    SynthesisGateway::new(endpoint, cache)
        .with_min_interval(Duration::ZERO)
        .with_retry_policy(RetryPolicy::new(4, Duration::from_secs(1)))
}

fn gaps(times: &[Instant]) -> Vec<Duration> {
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

// ── Retries ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_succeeds_after_two_backoffs() {
    let endpoint = ScriptedEndpoint::with_script([
        Err(EndpointError::RateLimited),
        Err(EndpointError::RateLimited),
        Ok(()),
    ]);
    let gateway = gateway(endpoint.clone());
    let start = Instant::now();

    let handle = gateway
        .synthesize("Hello listeners", "alto", &SynthesisContext::default())
        .await
        .unwrap();

    assert_eq!(handle.data, Bytes::from("audio:Hello listeners"));
    assert_eq!(endpoint.call_count(), 3);
    assert_eq!(
        gaps(&endpoint.call_times()),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn persistent_rate_limit_fails_after_max_attempts() {
    let endpoint = ScriptedEndpoint::always_failing(EndpointError::RateLimited, 10);
    let gateway = gateway(endpoint.clone());

    let err = gateway
        .synthesize("Hello", "alto", &SynthesisContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::RetriesExhausted { attempts: 4, .. }));
    assert_eq!(err.kind(), SynthesisErrorKind::RateLimited);
    assert_eq!(endpoint.call_count(), 4);

    let delays = gaps(&endpoint.call_times());
    assert_eq!(delays.len(), 3);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]), "delays must not decrease: {delays:?}");
}

#[tokio::test(start_paused = true)]
async fn server_and_network_errors_are_retried() {
    let endpoint = ScriptedEndpoint::with_script([
        Err(EndpointError::from_status(503, "busy")),
        Err(EndpointError::Network("connection reset".to_string())),
        Ok(()),
    ]);
    let gateway = gateway(endpoint.clone());

    assert!(
        gateway
            .synthesize("Hello", "alto", &SynthesisContext::default())
            .await
            .is_ok()
    );
    assert_eq!(endpoint.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_server_errors_are_transient_kind() {
    let endpoint = ScriptedEndpoint::always_failing(EndpointError::from_status(500, "boom"), 10);
    let gateway = gateway(endpoint.clone());

    let err = gateway
        .synthesize("Hello", "alto", &SynthesisContext::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SynthesisErrorKind::TransientServer);
}

#[tokio::test(start_paused = true)]
async fn client_error_fails_immediately_without_retry() {
    let endpoint = ScriptedEndpoint::with_script([Err(EndpointError::from_status(401, "bad key"))]);
    let gateway = gateway(endpoint.clone());
    let start = Instant::now();

    let err = gateway
        .synthesize("Hello", "alto", &SynthesisContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::Rejected(_)));
    assert_eq!(err.kind(), SynthesisErrorKind::FatalRequest);
    assert_eq!(endpoint.call_count(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

// ── Caching and normalization ──────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn identical_text_and_voice_is_requested_once() {
    let endpoint = ScriptedEndpoint::succeeding();
    let gateway = gateway(endpoint.clone());
    let ctx = SynthesisContext::default();

    let first = gateway.synthesize("Good evening", "alto", &ctx).await.unwrap();
    let second = gateway.synthesize("Good evening", "alto", &ctx).await.unwrap();
    let formatted = gateway.synthesize("**Good**   evening", "alto", &ctx).await.unwrap();

    assert_eq!(endpoint.call_count(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &formatted));

    gateway.synthesize("Good evening", "tenor", &ctx).await.unwrap();
    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_calls_for_the_same_text_share_one_request() {
    let endpoint = ScriptedEndpoint::slow(Duration::from_secs(2), []);
    let gateway = gateway(endpoint.clone());
    let ctx = SynthesisContext::default();

    let (first, second) = tokio::join!(
        gateway.synthesize("hello", "alto", &ctx),
        gateway.synthesize("**hello**", "alto", &ctx),
    );

    assert_eq!(endpoint.call_count(), 1);
    assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
    assert_eq!(gateway.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_calls_share_a_failure() {
    let endpoint = ScriptedEndpoint::slow(
        Duration::from_secs(1),
        [Err(EndpointError::from_status(401, "bad key"))],
    );
    let gateway = gateway(endpoint.clone());
    let ctx = SynthesisContext::default();

    let (first, second) = tokio::join!(
        gateway.synthesize("hello", "alto", &ctx),
        gateway.synthesize("hello", "alto", &ctx),
    );

    assert!(matches!(first, Err(SynthesisError::Rejected(_))));
    assert!(matches!(second, Err(SynthesisError::Rejected(_))));
    assert_eq!(endpoint.call_count(), 1);
    assert_eq!(gateway.in_flight_count(), 0);

    // Failures are not cached: a later call tries again.
    assert!(gateway.synthesize("hello", "alto", &ctx).await.is_ok());
    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_calls_with_different_voices_are_separate() {
    let endpoint = ScriptedEndpoint::slow(Duration::from_secs(1), []);
    let gateway = gateway(endpoint.clone());
    let ctx = SynthesisContext::default();

    let (alto, tenor) = tokio::join!(
        gateway.synthesize("hello", "alto", &ctx),
        gateway.synthesize("hello", "tenor", &ctx),
    );

    assert!(alto.is_ok() && tenor.is_ok());
    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn request_carries_normalized_text_and_context() {
    let endpoint = ScriptedEndpoint::succeeding();
    let gateway = gateway(endpoint.clone());

    gateway
        .synthesize(
            "## Tech\nSee [docs](https://x.y)",
            "alto",
            &SynthesisContext::new(Some("tech".to_string())),
        )
        .await
        .unwrap();

    let requests = endpoint.requests();
    let request = &requests[0];
    assert_eq!(request.text, "Tech See docs");
    assert_eq!(request.voice_id, "alto");
    assert_eq!(request.program_category.as_deref(), Some("tech"));
    assert!((request.speed - 1.0).abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn empty_text_fails_without_a_request() {
    let endpoint = ScriptedEndpoint::succeeding();
    let gateway = gateway(endpoint.clone());

    let err = gateway
        .synthesize("  ``` \n ``` ", "alto", &SynthesisContext::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::EmptyText));
    assert_eq!(err.kind(), SynthesisErrorKind::FatalRequest);
    assert_eq!(endpoint.call_count(), 0);
}

// ── Throttle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_requests_are_spaced_by_the_throttle() {
    let endpoint = ScriptedEndpoint::succeeding();
    let cache = Arc::new(AudioCache::memory_only(CacheConfig::default()));
    let gateway = Arc::new(
        SynthesisGateway::new(endpoint.clone(), cache).with_min_interval(Duration::from_secs(1)),
    );

    let tasks: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|text| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                gateway
                    .synthesize(text, "alto", &SynthesisContext::default())
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut times = endpoint.call_times();
    times.sort();
    assert!(gaps(&times).iter().all(|gap| *gap >= Duration::from_secs(1)));
}
