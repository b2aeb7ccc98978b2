use async_trait::async_trait;
use serde::Serialize;

use super::types::{AudioFormat, Voice};

/// Body of one remote speech request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechPayload {
    pub model: String,
    pub input: String,
    pub voice: Voice,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instructions: String,
    pub response_format: AudioFormat,
}

/// Raw outcome of a failed remote call, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// The remote answered with a non-success status
    Status { status: u16, body: String },
    /// The request was sent and the client-side timeout fired
    TimedOut(String),
    /// Connection failed or the response was lost in transit
    NoResponse(String),
    /// The request never left the client
    Setup(String),
}

/// Transport for a single synthesis call. Implementations perform exactly one
/// request per call and never retry on their own.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, payload: &SpeechPayload) -> Result<Vec<u8>, BackendFailure>;
}
