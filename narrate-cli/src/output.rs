use anyhow::Result;
use narrate_core::pipeline::{PipelineReport, RunOutcome, UsageSnapshot};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
pub struct RunSummary<'a> {
    #[serde(flatten)]
    pub report: &'a PipelineReport,
    pub outcome: RunOutcome,
    pub usage: UsageSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged: Option<PathBuf>,
}

pub fn print_json(summary: &RunSummary<'_>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

pub fn print_text(summary: &RunSummary<'_>) {
    let report = summary.report;

    println!(
        "{} of {} chunks synthesized ({} attempted)",
        report.succeeded, report.total_segments, report.attempted
    );
    for artifact in &report.artifacts {
        println!("  {}", artifact.path.display());
    }

    if !report.failures.is_empty() {
        println!("Failed chunks:");
        for failure in &report.failures {
            println!(
                "  chunk {}: {} after {} attempt(s): {}",
                failure.segment_index + 1,
                failure.kind,
                failure.attempts,
                failure.message
            );
        }
    }

    if report.cancelled {
        println!("Run was cancelled before all chunks were processed");
    }
    if report.aborted {
        println!("Run stopped after the first failure");
    }
    if let Some(path) = &summary.merged {
        println!("Merged into {}", path.display());
    }

    println!(
        "Usage: {} request(s), {} characters, {} bytes of audio",
        summary.usage.remote_attempts,
        summary.usage.characters_synthesized,
        summary.usage.audio_bytes
    );
}
