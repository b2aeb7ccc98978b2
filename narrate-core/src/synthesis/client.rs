use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::{BackendFailure, SpeechBackend, SpeechPayload};
use super::error::{ErrorKind, SynthesisError};
use super::retry::RetryPolicy;
use super::types::{AudioFormat, SpeechOptions, SynthesisRequest, Voice};
use crate::chunker::Segment;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini-tts";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub model: String,
    pub response_format: AudioFormat,
    /// Upper bound for a single attempt, including reading the body
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            response_format: AudioFormat::default(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Audio for one request plus how many remote attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesized {
    pub audio: Vec<u8>,
    pub attempts: u32,
}

/// Turns one segment into audio bytes, retrying transient failures and
/// classifying everything else.
#[derive(Clone)]
pub struct SynthesisClient {
    backend: Arc<dyn SpeechBackend>,
    config: SynthesisConfig,
}

impl SynthesisClient {
    pub fn new(backend: Arc<dyn SpeechBackend>, config: SynthesisConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn response_format(&self) -> AudioFormat {
        self.config.response_format
    }

    pub async fn synthesize(
        &self,
        segment: &Segment,
        voice: Voice,
        instructions: &str,
        options: &SpeechOptions,
    ) -> Result<Vec<u8>, SynthesisError> {
        self.synthesize_detailed(segment, voice, instructions, options)
            .await
            .map(|synthesized| synthesized.audio)
    }

    pub async fn synthesize_detailed(
        &self,
        segment: &Segment,
        voice: Voice,
        instructions: &str,
        options: &SpeechOptions,
    ) -> Result<Synthesized, SynthesisError> {
        let request = SynthesisRequest {
            text: segment.content.clone(),
            voice,
            instructions: instructions.to_string(),
            options: *options,
        };
        self.synthesize_request(&request).await
    }

    pub async fn synthesize_request(
        &self,
        request: &SynthesisRequest,
    ) -> Result<Synthesized, SynthesisError> {
        let payload = self.build_payload(request)?;
        let mut attempt = 1;

        loop {
            debug!(
                attempt,
                backend = self.backend.name(),
                chars = payload.input.chars().count(),
                "Sending synthesis request"
            );

            let error = match self.attempt(&payload).await {
                Ok(audio) => {
                    if attempt > 1 {
                        info!("Synthesis succeeded after {} retries", attempt - 1);
                    }
                    return Ok(Synthesized { audio, attempts: attempt });
                }
                Err(failure) => classify(failure),
            };

            if !self.config.retry.should_retry(error.retryable, attempt) {
                warn!(
                    attempt,
                    kind = %error.kind,
                    error = %error.message,
                    "Synthesis failed"
                );
                return Err(error.with_attempts(attempt));
            }

            warn!(
                attempt,
                max_attempts = self.config.retry.max_attempts,
                backoff_ms = self.config.retry.backoff.delay(attempt).as_millis() as u64,
                kind = %error.kind,
                error = %error.message,
                "Synthesis failed, retrying after backoff"
            );
            self.config.retry.backoff.wait(attempt).await;
            attempt += 1;
        }
    }

    fn build_payload(&self, request: &SynthesisRequest) -> Result<SpeechPayload, SynthesisError> {
        if request.text.trim().is_empty() {
            return Err(SynthesisError::new(
                ErrorKind::RequestSetupError,
                "Cannot synthesize empty text",
            ));
        }
        if self.config.model.trim().is_empty() {
            return Err(SynthesisError::new(
                ErrorKind::RequestSetupError,
                "No synthesis model configured",
            ));
        }

        Ok(SpeechPayload {
            model: self.config.model.clone(),
            input: request.text.clone(),
            voice: request.voice,
            instructions: request.rendered_instructions(),
            response_format: self.config.response_format,
        })
    }

    async fn attempt(&self, payload: &SpeechPayload) -> Result<Vec<u8>, BackendFailure> {
        match tokio::time::timeout(self.config.timeout, self.backend.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(BackendFailure::TimedOut(format!(
                "No response within {}ms",
                self.config.timeout.as_millis()
            ))),
        }
    }
}

fn classify(failure: BackendFailure) -> SynthesisError {
    match failure {
        BackendFailure::Status { status: 504, body } => SynthesisError::new(
            ErrorKind::UpstreamTimeout,
            format!(
                "Speech service timed out (504); reduce the input size and try again: {}",
                truncate(&body)
            ),
        ),
        BackendFailure::Status { status: 429, body } => SynthesisError::new(
            ErrorKind::RateLimited,
            format!("Speech service rate limit exceeded (429): {}", truncate(&body)),
        ),
        BackendFailure::Status { status, body } if (400..500).contains(&status) => {
            SynthesisError::new(
                ErrorKind::RequestRejected,
                format!("Speech service rejected the request ({status}): {}", truncate(&body)),
            )
        }
        BackendFailure::Status { status, body } if (500..600).contains(&status) => {
            SynthesisError::new(
                ErrorKind::UpstreamError,
                format!("Speech service error ({status}): {}", truncate(&body)),
            )
        }
        // 1xx and unfollowed 3xx
        BackendFailure::Status { status, body } => SynthesisError::new(
            ErrorKind::RequestRejected,
            format!("Unexpected response from speech service ({status}): {}", truncate(&body)),
        ),
        BackendFailure::TimedOut(message) => {
            SynthesisError::new(ErrorKind::RequestTimeout, message)
        }
        BackendFailure::NoResponse(message) => SynthesisError::new(
            ErrorKind::NoResponse,
            format!("No response from speech service: {message}"),
        ),
        BackendFailure::Setup(message) => SynthesisError::new(
            ErrorKind::RequestSetupError,
            format!("Failed to build speech request: {message}"),
        ),
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let head: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{head}...")
}
