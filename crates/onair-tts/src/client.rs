//! HTTP implementation of the synthesis endpoint.
//!
//! One call is one attempt; retrying is the gateway's concern.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use onair_core::{EndpointError, SynthesisEndpoint, SynthesisRequest, SynthesizedAudio};

use crate::config::TtsClientConfig;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    text: &'a str,
    voice_id: &'a str,
    speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    program_category: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    audio_data: String,
    #[serde(default = "default_mime_type")]
    mime_type: String,
}

fn default_mime_type() -> String {
    "audio/mpeg".to_string()
}

/// Synthesis endpoint reached over HTTP with reqwest.
pub struct HttpSynthesisEndpoint {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpSynthesisEndpoint {
    pub fn new(config: &TtsClientConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            url: config.synthesize_url(),
            api_key: config.api_key.clone(),
        })
    }

    fn build_request(&self, body: &RequestBody<'_>) -> reqwest::RequestBuilder {
        let mut request = self.client.post(self.url.as_str()).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}

/// Decode base64 audio, accepting an optional `data:<mime>;base64,` prefix.
fn decode_audio(encoded: &str) -> Result<Bytes, EndpointError> {
    let payload = encoded
        .split_once(";base64,")
        .map_or(encoded, |(_, data)| data)
        .trim();

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| EndpointError::InvalidResponse(format!("audio is not valid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(EndpointError::InvalidResponse("empty audio payload".to_string()));
    }
    Ok(Bytes::from(bytes))
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[async_trait]
impl SynthesisEndpoint for HttpSynthesisEndpoint {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, EndpointError> {
        let body = RequestBody {
            text: &request.text,
            voice_id: &request.voice_id,
            speed: request.speed,
            program_category: request.program_category.as_deref(),
        };

        let response = self
            .build_request(&body)
            .send()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EndpointError::from_status(status.as_u16(), truncate(&message)));
        }

        // A body cut off mid-transfer is a transport failure, not a bad payload.
        let raw = response
            .bytes()
            .await
            .map_err(|e| EndpointError::Network(e.to_string()))?;
        let parsed: ResponseBody = serde_json::from_slice(&raw)
            .map_err(|e| EndpointError::InvalidResponse(e.to_string()))?;

        Ok(SynthesizedAudio {
            data: decode_audio(&parsed.audio_data)?,
            mime_type: parsed.mime_type,
        })
    }
}
