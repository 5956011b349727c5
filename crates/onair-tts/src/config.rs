//! Public configuration for the synthesis HTTP client.

use std::time::Duration;

/// Default synthesis service location.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

/// Configuration for [`HttpSynthesisEndpoint`](crate::HttpSynthesisEndpoint).
///
/// # Example
///
/// ```
/// use onair_tts::TtsClientConfig;
/// use std::time::Duration;
///
/// let config = TtsClientConfig::new()
///     .with_base_url("https://tts.example.com")
///     .with_api_key("secret")
///     .with_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct TtsClientConfig {
    /// Service root; requests go to `{base_url}/synthesize`
    pub(crate) base_url: String,
    /// Sent as a bearer token when present
    pub(crate) api_key: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) user_agent: String,
}

impl Default for TtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            user_agent: concat!("onair-tts/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TtsClientConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set an optional API key.
    #[must_use]
    pub fn with_optional_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Set the per-request timeout.
    ///
    /// Defaults to 60 seconds; synthesis of a long chunk is slow.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL of the synthesis route.
    pub fn synthesize_url(&self) -> String {
        format!("{}/synthesize", self.base_url.trim_end_matches('/'))
    }
}
