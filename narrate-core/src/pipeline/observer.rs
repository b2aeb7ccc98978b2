//! Hooks for watching a pipeline run.
//!
//! Usage accounting lives behind [`PipelineObserver`] so the orchestrator never
//! touches process-wide state. [`UsageCounters`] is the stock collector.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::report::{Artifact, PipelineReport};
use crate::chunker::Segment;
use crate::synthesis::SynthesisError;

/// Notified by the orchestrator as segments move through a run. Calls may
/// arrive from several tasks at once when the run is concurrent.
pub trait PipelineObserver: Send + Sync {
    fn on_run_started(&self, _total_segments: usize) {}

    fn on_segment_started(&self, _segment: &Segment) {}

    fn on_segment_succeeded(
        &self,
        _segment: &Segment,
        _artifact: &Artifact,
        _audio_bytes: usize,
        _attempts: u32,
    ) {
    }

    fn on_segment_failed(&self, _segment: &Segment, _error: &SynthesisError) {}

    fn on_run_finished(&self, _report: &PipelineReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

#[derive(Debug, Default)]
pub struct UsageCounters {
    runs: AtomicU64,
    segments_started: AtomicU64,
    segments_succeeded: AtomicU64,
    segments_failed: AtomicU64,
    remote_attempts: AtomicU64,
    characters_synthesized: AtomicU64,
    audio_bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub runs: u64,
    pub segments_started: u64,
    pub segments_succeeded: u64,
    pub segments_failed: u64,
    pub remote_attempts: u64,
    pub characters_synthesized: u64,
    pub audio_bytes: u64,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            segments_started: self.segments_started.load(Ordering::Relaxed),
            segments_succeeded: self.segments_succeeded.load(Ordering::Relaxed),
            segments_failed: self.segments_failed.load(Ordering::Relaxed),
            remote_attempts: self.remote_attempts.load(Ordering::Relaxed),
            characters_synthesized: self.characters_synthesized.load(Ordering::Relaxed),
            audio_bytes: self.audio_bytes.load(Ordering::Relaxed),
        }
    }
}

impl PipelineObserver for UsageCounters {
    fn on_run_started(&self, _total_segments: usize) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    fn on_segment_started(&self, _segment: &Segment) {
        self.segments_started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_segment_succeeded(
        &self,
        segment: &Segment,
        _artifact: &Artifact,
        audio_bytes: usize,
        attempts: u32,
    ) {
        self.segments_succeeded.fetch_add(1, Ordering::Relaxed);
        self.remote_attempts
            .fetch_add(u64::from(attempts), Ordering::Relaxed);
        self.characters_synthesized
            .fetch_add(segment.len() as u64, Ordering::Relaxed);
        self.audio_bytes
            .fetch_add(audio_bytes as u64, Ordering::Relaxed);
    }

    fn on_segment_failed(&self, _segment: &Segment, error: &SynthesisError) {
        self.segments_failed.fetch_add(1, Ordering::Relaxed);
        self.remote_attempts
            .fetch_add(u64::from(error.attempts), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_usage_counters_accumulate() {
        let counters = UsageCounters::new();
        let segment = Segment {
            index: 0,
            content: "hello".to_string(),
        };
        let artifact = Artifact {
            path: PathBuf::from("chunk_1.mp3"),
            segment_index: 0,
        };

        counters.on_run_started(2);
        counters.on_segment_started(&segment);
        counters.on_segment_succeeded(&segment, &artifact, 42, 2);
        counters.on_segment_started(&segment);
        counters.on_segment_failed(
            &segment,
            &SynthesisError {
                kind: ErrorKind::UpstreamError,
                message: "boom".to_string(),
                retryable: true,
                attempts: 3,
            },
        );

        assert_eq!(
            counters.snapshot(),
            UsageSnapshot {
                runs: 1,
                segments_started: 2,
                segments_succeeded: 1,
                segments_failed: 1,
                remote_attempts: 5,
                characters_synthesized: 5,
                audio_bytes: 42,
            }
        );
    }
}
