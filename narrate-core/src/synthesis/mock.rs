use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{BackendFailure, SpeechBackend, SpeechPayload};

/// Mock behavior for the mock speech backend
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Return `AUDIO:<input>` as the audio bytes
    #[default]
    Success,
    /// Always answer with the given HTTP status
    AlwaysStatus { status: u16 },
    /// Answer with the given status N times, then succeed
    StatusThenSuccess { status: u16, remaining_errors: usize },
    /// Always lose the connection
    AlwaysNoResponse,
    /// Always hit the client-side timeout
    AlwaysTimedOut,
    /// Always fail before sending
    AlwaysSetupFailure,
    /// Answer with `status` when the input contains `needle`, succeed otherwise
    FailWhenInputContains { needle: String, status: u16 },
    /// Succeed after sleeping; inputs listed here wait the given milliseconds
    DelayedSuccess { delays: Vec<(String, u64)> },
}

/// Mock speech backend for testing
#[derive(Clone)]
pub struct MockSpeechBackend {
    behavior: Arc<Mutex<MockBehavior>>,
    call_count: Arc<Mutex<usize>>,
    captured_payloads: Arc<Mutex<Vec<SpeechPayload>>>,
}

impl MockSpeechBackend {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            call_count: Arc::new(Mutex::new(0)),
            captured_payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn captured_payloads(&self) -> Vec<SpeechPayload> {
        self.captured_payloads.lock().unwrap().clone()
    }

    pub fn audio_for(input: &str) -> Vec<u8> {
        format!("AUDIO:{input}").into_bytes()
    }
}

#[async_trait]
impl SpeechBackend for MockSpeechBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, payload: &SpeechPayload) -> Result<Vec<u8>, BackendFailure> {
        *self.call_count.lock().unwrap() += 1;
        self.captured_payloads.lock().unwrap().push(payload.clone());

        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            MockBehavior::Success => Ok(Self::audio_for(&payload.input)),
            MockBehavior::AlwaysStatus { status } => Err(BackendFailure::Status {
                status,
                body: format!("Mock status {status}"),
            }),
            MockBehavior::StatusThenSuccess {
                status,
                remaining_errors,
            } => {
                if remaining_errors == 0 {
                    return Ok(Self::audio_for(&payload.input));
                }
                self.set_behavior(MockBehavior::StatusThenSuccess {
                    status,
                    remaining_errors: remaining_errors - 1,
                });
                Err(BackendFailure::Status {
                    status,
                    body: format!("Mock status {status} (remaining: {})", remaining_errors - 1),
                })
            }
            MockBehavior::AlwaysNoResponse => Err(BackendFailure::NoResponse(
                "Mock connection reset".to_string(),
            )),
            MockBehavior::AlwaysTimedOut => Err(BackendFailure::TimedOut(
                "Mock request timed out".to_string(),
            )),
            MockBehavior::AlwaysSetupFailure => Err(BackendFailure::Setup(
                "Mock malformed payload".to_string(),
            )),
            MockBehavior::FailWhenInputContains { needle, status } => {
                if payload.input.contains(&needle) {
                    Err(BackendFailure::Status {
                        status,
                        body: format!("Mock status {status} for {needle}"),
                    })
                } else {
                    Ok(Self::audio_for(&payload.input))
                }
            }
            MockBehavior::DelayedSuccess { delays } => {
                let delay = delays
                    .iter()
                    .find(|(input, _)| *input == payload.input)
                    .map(|(_, millis)| *millis)
                    .unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Self::audio_for(&payload.input))
            }
        }
    }
}
