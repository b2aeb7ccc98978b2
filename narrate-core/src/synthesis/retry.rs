use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Delay strategy between attempts.
#[async_trait]
pub trait Backoff: Send + Sync {
    /// Delay after the 1-based `attempt` failed and before the next one starts.
    fn delay(&self, attempt: u32) -> Duration;

    async fn wait(&self, attempt: u32) {
        sleep(self.delay(attempt)).await;
    }
}

/// `base × attempt`: 1s then 2s with the default base.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub base: Duration,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

#[async_trait]
impl Backoff for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}

/// Computes the same delays as the wrapped strategy but only records them.
/// Lets tests assert on timing without sleeping.
#[derive(Clone)]
pub struct RecordingBackoff {
    inner: Arc<dyn Backoff>,
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingBackoff {
    pub fn new(inner: Arc<dyn Backoff>) -> Self {
        Self {
            inner,
            waits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn linear() -> Self {
        Self::new(Arc::new(LinearBackoff::default()))
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backoff for RecordingBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.inner.delay(attempt)
    }

    async fn wait(&self, attempt: u32) {
        let delay = self.delay(attempt);
        self.waits.lock().unwrap().push(delay);
    }
}

#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub backoff: Arc<dyn Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Arc::new(LinearBackoff::default()),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, Arc::new(LinearBackoff { base }))
    }

    pub(crate) fn should_retry(&self, retryable: bool, attempt: u32) -> bool {
        retryable && attempt < self.max_attempts
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_delays() {
        let backoff = LinearBackoff::default();
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(3), Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_recording_backoff_does_not_sleep() {
        let backoff = RecordingBackoff::linear();
        let started = std::time::Instant::now();
        backoff.wait(1).await;
        backoff.wait(2).await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(
            backoff.waits(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_should_retry_respects_attempt_budget() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(true, 1));
        assert!(policy.should_retry(true, 2));
        assert!(!policy.should_retry(true, 3));
        assert!(!policy.should_retry(false, 1));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::linear(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
    }
}
