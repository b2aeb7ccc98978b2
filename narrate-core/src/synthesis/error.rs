use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed synthesis call. Decided once by the client so
/// callers never have to inspect status codes or error strings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Remote gateway timed out (504). The input is likely too large.
    UpstreamTimeout,
    /// Remote throttled the request (429)
    RateLimited,
    /// Remote rejected the request itself (4xx)
    RequestRejected,
    /// The request was sent but the client gave up waiting
    RequestTimeout,
    /// Remote failed with a 5xx on every attempt
    UpstreamError,
    /// No response arrived on any attempt
    NoResponse,
    /// The request could not be built or sent
    RequestSetupError,
    /// Audio arrived but could not be written to disk
    PersistFailed,
}

impl ErrorKind {
    /// Whether another attempt of the same request could succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::UpstreamError | Self::NoResponse)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct SynthesisError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub attempts: u32,
}

impl SynthesisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
            attempts: 1,
        }
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}
