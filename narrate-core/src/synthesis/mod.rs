pub mod backend;
pub mod client;
pub mod error;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod types;

pub use backend::{BackendFailure, SpeechBackend, SpeechPayload};
pub use client::{SynthesisClient, SynthesisConfig, Synthesized};
pub use error::{ErrorKind, SynthesisError};
pub use retry::{Backoff, LinearBackoff, RecordingBackoff, RetryPolicy};
pub use types::{AudioFormat, SpeechOptions, SynthesisRequest, Voice};
