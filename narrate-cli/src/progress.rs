use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use narrate_core::chunker::Segment;
use narrate_core::pipeline::{Artifact, PipelineObserver, PipelineReport, UsageCounters};
use narrate_core::synthesis::SynthesisError;

/// Progress bar over segments, forwarding every event to a usage collector.
pub struct ProgressObserver {
    bar: ProgressBar,
    usage: Arc<UsageCounters>,
}

impl ProgressObserver {
    pub fn new(usage: Arc<UsageCounters>, visible: bool) -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        if !visible {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} segments")?
            .progress_chars("#>-");
        bar.set_style(style);

        Ok(Self { bar, usage })
    }
}

impl PipelineObserver for ProgressObserver {
    fn on_run_started(&self, total_segments: usize) {
        self.bar.set_length(total_segments as u64);
        self.bar.set_message("Synthesizing");
        self.usage.on_run_started(total_segments);
    }

    fn on_segment_started(&self, segment: &Segment) {
        self.usage.on_segment_started(segment);
    }

    fn on_segment_succeeded(
        &self,
        segment: &Segment,
        artifact: &Artifact,
        audio_bytes: usize,
        attempts: u32,
    ) {
        self.bar.inc(1);
        self.usage
            .on_segment_succeeded(segment, artifact, audio_bytes, attempts);
    }

    fn on_segment_failed(&self, segment: &Segment, error: &SynthesisError) {
        self.bar.println(format!(
            "segment {} failed: {} ({})",
            segment.position(),
            error.message,
            error.kind
        ));
        self.bar.inc(1);
        self.usage.on_segment_failed(segment, error);
    }

    fn on_run_finished(&self, report: &PipelineReport) {
        let message = if report.cancelled {
            "Cancelled"
        } else if report.aborted {
            "Stopped after failure"
        } else {
            "Done"
        };
        self.bar.finish_with_message(message);
        self.usage.on_run_finished(report);
    }
}
