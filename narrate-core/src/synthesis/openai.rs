//! OpenAI-compatible `/audio/speech` backend

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use super::backend::{BackendFailure, SpeechBackend, SpeechPayload};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiSpeechConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiSpeechConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(30_000),
        }
    }
}

pub struct OpenAiSpeechBackend {
    config: OpenAiSpeechConfig,
    client: Client,
}

impl OpenAiSpeechBackend {
    pub fn new(config: OpenAiSpeechConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client for speech backend")?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechBackend for OpenAiSpeechBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn send(&self, payload: &SpeechPayload) -> Result<Vec<u8>, BackendFailure> {
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| BackendFailure::Setup(format!("Invalid API key header: {e}")))?;

        let response = self
            .client
            .post(self.endpoint())
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                debug!(?e, "Speech API call failed");
                classify_transport(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(?status, %body, "Speech API returned error");
            return Err(BackendFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(classify_transport)?;
        Ok(bytes.to_vec())
    }
}

fn classify_transport(error: reqwest::Error) -> BackendFailure {
    if error.is_builder() {
        BackendFailure::Setup(error.to_string())
    } else if error.is_timeout() {
        BackendFailure::TimedOut(error.to_string())
    } else {
        BackendFailure::NoResponse(error.to_string())
    }
}
