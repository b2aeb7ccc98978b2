//! Drives a document through chunking, synthesis and persistence.
//!
//! A failed segment is recorded and skipped unless the run uses
//! [`FailurePolicy::FailFast`]. That includes a segment whose audio could not
//! be written. Only chunker misconfiguration and an unusable output directory
//! abort a run with an error.

pub mod merge;
pub mod observer;
pub mod report;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::chunker::{self, ChunkError, Segment, SplitMode};
use crate::synthesis::{ErrorKind, SpeechOptions, SynthesisClient, SynthesisError, Voice};

pub use merge::{merge_artifacts, MergeError, MergeOutcome, MergeSettings};
pub use observer::{NoopObserver, PipelineObserver, UsageCounters, UsageSnapshot};
pub use report::{Artifact, PipelineReport, RunOutcome, SegmentFailure, SegmentOutcome};

pub const DEFAULT_MAX_CHUNK_LEN: i64 = 1000;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidArgument(#[from] ChunkError),

    #[error("Output directory {path:?} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Segment task failed: {0}")]
    Task(String),
}

/// What to do when one segment cannot be synthesized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and move on to the next segment
    #[default]
    Continue,
    /// Stop starting new segments after the first failure
    FailFast,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_chunk_len: i64,
    pub split_mode: SplitMode,
    pub failure_policy: FailurePolicy,
    /// Segments in flight at once; 1 keeps the run strictly sequential
    pub max_concurrency: usize,
    pub options: SpeechOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            split_mode: SplitMode::default(),
            failure_policy: FailurePolicy::default(),
            max_concurrency: 1,
            options: SpeechOptions::default(),
        }
    }
}

/// Caller-supplied stop conditions for a run. Remaining segments are skipped
/// and an in-flight call is dropped once either one fires.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancel when `true` is sent on the paired sender.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_stopped(&self) -> bool {
        let past_deadline = self.deadline.is_some_and(|d| Instant::now() >= d);
        let cancelled = self.cancel.as_ref().is_some_and(|rx| *rx.borrow());
        past_deadline || cancelled
    }

    /// Resolves once the run should stop. Never resolves without stop conditions.
    pub async fn stopped(&self) {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let cancel = async {
            let Some(mut rx) = self.cancel.clone() else {
                return std::future::pending().await;
            };
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender gone without cancelling
                    return std::future::pending().await;
                }
            }
        };

        tokio::select! {
            _ = deadline => {}
            _ = cancel => {}
        }
    }
}

/// Per-run values every segment task needs.
#[derive(Clone)]
struct SegmentJob {
    client: Arc<SynthesisClient>,
    observer: Arc<dyn PipelineObserver>,
    control: RunControl,
    voice: Voice,
    instructions: Arc<str>,
    options: SpeechOptions,
    output_dir: PathBuf,
}

impl SegmentJob {
    /// `None` when the run was stopped while this segment was in flight.
    async fn process(&self, segment: &Segment) -> Option<SegmentOutcome> {
        self.observer.on_segment_started(segment);
        debug!(
            segment = segment.position(),
            chars = segment.len(),
            "Synthesizing segment"
        );

        let result = tokio::select! {
            result = self.client.synthesize_detailed(
                segment,
                self.voice,
                &self.instructions,
                &self.options,
            ) => result,
            _ = self.control.stopped() => {
                info!(segment = segment.position(), "Run stopped while segment was in flight");
                return None;
            }
        };

        let synthesized = match result {
            Ok(synthesized) => synthesized,
            Err(error) => return Some(self.fail(segment, error)),
        };

        let path = artifact_path(
            &self.output_dir,
            segment,
            self.client.response_format().extension(),
        );
        if let Err(e) = tokio::fs::write(&path, &synthesized.audio).await {
            let error = SynthesisError::new(
                ErrorKind::PersistFailed,
                format!("Failed to write {}: {e}", path.display()),
            )
            .with_attempts(synthesized.attempts);
            return Some(self.fail(segment, error));
        }

        let artifact = Artifact {
            path,
            segment_index: segment.index,
        };
        self.observer.on_segment_succeeded(
            segment,
            &artifact,
            synthesized.audio.len(),
            synthesized.attempts,
        );
        Some(SegmentOutcome::Succeeded(artifact))
    }

    fn fail(&self, segment: &Segment, error: SynthesisError) -> SegmentOutcome {
        warn!(
            segment = segment.position(),
            kind = %error.kind,
            attempts = error.attempts,
            error = %error.message,
            "Skipping failed segment"
        );
        self.observer.on_segment_failed(segment, &error);
        SegmentOutcome::Failed(SegmentFailure::from_error(segment.index, &error))
    }
}

/// `chunk_<index+1>.<ext>`; failed segments leave gaps in the numbering.
pub fn artifact_path(output_dir: &Path, segment: &Segment, extension: &str) -> PathBuf {
    output_dir.join(format!("chunk_{}.{extension}", segment.position()))
}

pub struct Pipeline {
    client: Arc<SynthesisClient>,
    config: PipelineConfig,
    observer: Arc<dyn PipelineObserver>,
}

impl Pipeline {
    pub fn new(client: SynthesisClient, config: PipelineConfig) -> Self {
        Self {
            client: Arc::new(client),
            config,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(
        &self,
        document: &str,
        output_dir: &Path,
        voice: Voice,
        instructions: &str,
    ) -> Result<PipelineReport, PipelineError> {
        self.run_with(document, output_dir, voice, instructions, RunControl::default())
            .await
    }

    pub async fn run_with(
        &self,
        document: &str,
        output_dir: &Path,
        voice: Voice,
        instructions: &str,
        control: RunControl,
    ) -> Result<PipelineReport, PipelineError> {
        let segments = chunker::split_with_mode(
            document,
            self.config.max_chunk_len,
            self.config.split_mode,
        )?;
        prepare_output_dir(output_dir).await?;

        info!(
            segments = segments.len(),
            chars = document.chars().count(),
            max_chunk_len = self.config.max_chunk_len,
            concurrency = self.config.max_concurrency,
            output_dir = ?output_dir,
            "Starting synthesis run"
        );
        self.observer.on_run_started(segments.len());

        let job = SegmentJob {
            client: self.client.clone(),
            observer: self.observer.clone(),
            control,
            voice,
            instructions: Arc::from(instructions),
            options: self.config.options,
            output_dir: output_dir.to_path_buf(),
        };

        let total = segments.len();
        let report = if self.config.max_concurrency <= 1 {
            self.run_sequential(segments, &job).await?
        } else {
            self.run_concurrent(segments, &job).await?
        };

        match report.outcome() {
            RunOutcome::AllFailed => warn!(
                attempted = report.attempted,
                total, "No segments produced audio"
            ),
            outcome => info!(
                ?outcome,
                attempted = report.attempted,
                succeeded = report.succeeded,
                cancelled = report.cancelled,
                aborted = report.aborted,
                "Synthesis run finished"
            ),
        }
        self.observer.on_run_finished(&report);
        Ok(report)
    }

    async fn run_sequential(
        &self,
        segments: Vec<Segment>,
        job: &SegmentJob,
    ) -> Result<PipelineReport, PipelineError> {
        let total = segments.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;
        let mut aborted = false;

        for segment in &segments {
            if job.control.is_stopped() {
                cancelled = true;
                break;
            }

            let Some(outcome) = job.process(segment).await else {
                cancelled = true;
                break;
            };

            let failed = matches!(outcome, SegmentOutcome::Failed(_));
            outcomes.push(outcome);
            if failed && self.config.failure_policy == FailurePolicy::FailFast {
                aborted = true;
                break;
            }
        }

        let mut report = PipelineReport::from_outcomes(total, outcomes);
        report.cancelled = cancelled;
        report.aborted = aborted;
        Ok(report)
    }

    /// Bounded fan-out. Each task owns its retry state; results are only
    /// combined after joining, so the report needs no locking.
    async fn run_concurrent(
        &self,
        segments: Vec<Segment>,
        job: &SegmentJob,
    ) -> Result<PipelineReport, PipelineError> {
        let total = segments.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let halt = Arc::new(AtomicBool::new(false));
        let fail_fast = self.config.failure_policy == FailurePolicy::FailFast;
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for segment in segments {
            let permit = tokio::select! {
                biased;
                _ = job.control.stopped() => {
                    cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => permit
                    .map_err(|e| PipelineError::Task(e.to_string()))?,
            };
            if halt.load(Ordering::SeqCst) {
                break;
            }
            // The stop signal may have fired while waiting for the permit
            if job.control.is_stopped() {
                cancelled = true;
                break;
            }

            let job = job.clone();
            let halt = halt.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = job.process(&segment).await;
                if fail_fast && matches!(outcome, Some(SegmentOutcome::Failed(_))) {
                    halt.store(true, Ordering::SeqCst);
                }
                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => cancelled = true,
                Err(e) => {
                    first_error.get_or_insert(PipelineError::Task(e.to_string()));
                }
            }
        }
        // Only a panicking task lands here; every segment failure is an outcome
        if let Some(error) = first_error {
            return Err(error);
        }

        let mut report = PipelineReport::from_outcomes(total, outcomes);
        report.cancelled = cancelled;
        report.aborted = halt.load(Ordering::SeqCst);
        Ok(report)
    }
}

async fn prepare_output_dir(output_dir: &Path) -> Result<(), PipelineError> {
    let to_error = |source| PipelineError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    };

    tokio::fs::create_dir_all(output_dir).await.map_err(to_error)?;
    let metadata = tokio::fs::metadata(output_dir).await.map_err(to_error)?;
    if metadata.permissions().readonly() {
        return Err(to_error(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "directory is read-only",
        )));
    }
    Ok(())
}
