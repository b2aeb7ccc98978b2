use std::path::PathBuf;

use serde::Serialize;

use crate::synthesis::{ErrorKind, SynthesisError};

/// A persisted audio file for one successfully synthesized segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub segment_index: usize,
}

/// Why a segment produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentFailure {
    pub segment_index: usize,
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

impl SegmentFailure {
    pub fn from_error(segment_index: usize, error: &SynthesisError) -> Self {
        Self {
            segment_index,
            kind: error.kind,
            message: error.message.clone(),
            attempts: error.attempts,
        }
    }
}

/// Result of driving one segment through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    Succeeded(Artifact),
    Failed(SegmentFailure),
}

impl SegmentOutcome {
    fn segment_index(&self) -> usize {
        match self {
            Self::Succeeded(artifact) => artifact.segment_index,
            Self::Failed(failure) => failure.segment_index,
        }
    }
}

/// How a caller should read a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The document had no speakable text. Not an error.
    NothingToSynthesize,
    /// Segments were attempted and none produced audio
    AllFailed,
    /// Some segments produced audio
    Partial,
    /// Every segment produced audio
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Ordered by `segment_index`, no duplicates
    pub artifacts: Vec<Artifact>,
    /// Ordered by `segment_index`
    pub failures: Vec<SegmentFailure>,
    pub total_segments: usize,
    pub attempted: usize,
    pub succeeded: usize,
    /// A cancellation signal or deadline stopped the run early
    pub cancelled: bool,
    /// Fail-fast policy stopped the run after a failure
    pub aborted: bool,
}

impl PipelineReport {
    pub(crate) fn from_outcomes(total_segments: usize, mut outcomes: Vec<SegmentOutcome>) -> Self {
        outcomes.sort_by_key(SegmentOutcome::segment_index);
        outcomes.dedup_by_key(|outcome| outcome.segment_index());

        let attempted = outcomes.len();
        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                SegmentOutcome::Succeeded(artifact) => artifacts.push(artifact),
                SegmentOutcome::Failed(failure) => failures.push(failure),
            }
        }

        Self {
            succeeded: artifacts.len(),
            artifacts,
            failures,
            total_segments,
            attempted,
            cancelled: false,
            aborted: false,
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.attempted == 0 {
            if self.total_segments == 0 {
                return RunOutcome::NothingToSynthesize;
            }
            return RunOutcome::AllFailed;
        }
        if self.succeeded == 0 {
            RunOutcome::AllFailed
        } else if self.succeeded == self.total_segments {
            RunOutcome::Complete
        } else {
            RunOutcome::Partial
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.artifacts.iter().map(|a| a.path.clone()).collect()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.segment_index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(index: usize) -> SegmentOutcome {
        SegmentOutcome::Succeeded(Artifact {
            path: PathBuf::from(format!("chunk_{}.mp3", index + 1)),
            segment_index: index,
        })
    }

    fn failed(index: usize) -> SegmentOutcome {
        SegmentOutcome::Failed(SegmentFailure {
            segment_index: index,
            kind: ErrorKind::RateLimited,
            message: "slow down".to_string(),
            attempts: 1,
        })
    }

    #[test]
    fn test_outcomes_sorted_by_segment_index() {
        let report = PipelineReport::from_outcomes(4, vec![ok(3), failed(1), ok(0), ok(2)]);
        let indices: Vec<usize> = report.artifacts.iter().map(|a| a.segment_index).collect();
        assert_eq!(indices, vec![0, 2, 3]);
        assert_eq!(report.failed_indices(), vec![1]);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.outcome(), RunOutcome::Partial);
    }

    #[test]
    fn test_duplicate_indices_collapsed() {
        let report = PipelineReport::from_outcomes(1, vec![ok(0), ok(0)]);
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.attempted, 1);
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(
            PipelineReport::from_outcomes(0, vec![]).outcome(),
            RunOutcome::NothingToSynthesize
        );
        assert_eq!(
            PipelineReport::from_outcomes(2, vec![failed(0), failed(1)]).outcome(),
            RunOutcome::AllFailed
        );
        assert_eq!(
            PipelineReport::from_outcomes(2, vec![ok(0), ok(1)]).outcome(),
            RunOutcome::Complete
        );
        // Cancelled before anything finished
        assert_eq!(
            PipelineReport::from_outcomes(3, vec![]).outcome(),
            RunOutcome::AllFailed
        );
    }
}
