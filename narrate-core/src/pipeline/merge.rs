//! Best-effort concatenation of chunk files into one audio file.
//!
//! Relies on an external `ffmpeg`. A missing or failing tool is always an
//! error; nothing here silently falls back to the unmerged files.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use super::report::Artifact;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default = "default_merge_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_merge_timeout_secs() -> u64 {
    120
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_merge_timeout_secs(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Merge tool not available at '{0}'")]
    ToolMissing(String),

    #[error("Merge tool exited with code {code}: {stderr}")]
    ToolFailed { code: i32, stderr: String },

    #[error("Merge tool did not finish within {0}s")]
    TimedOut(u64),

    #[error("IO error during merge: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// One combined file; the chunk files are left in place
    Merged { path: PathBuf, sources: Vec<Artifact> },
    /// Merge disabled or nothing to combine; artifacts returned untouched
    Skipped(Vec<Artifact>),
}

/// Concatenate `artifacts` in order into `destination` with stream copy.
pub async fn merge_artifacts(
    artifacts: Vec<Artifact>,
    destination: &Path,
    settings: &MergeSettings,
) -> Result<MergeOutcome, MergeError> {
    if !settings.enabled || artifacts.len() < 2 {
        return Ok(MergeOutcome::Skipped(artifacts));
    }

    ensure_tool(&settings.ffmpeg_path).await?;

    // The concat demuxer resolves relative entries against the list's own
    // directory, not the working directory
    let mut sources = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        sources.push(tokio::fs::canonicalize(&artifact.path).await?);
    }

    let list_path = concat_list_path(destination);
    tokio::fs::write(&list_path, concat_list(&sources)).await?;

    let result = run_concat(&list_path, destination, settings).await;
    if let Err(e) = tokio::fs::remove_file(&list_path).await {
        warn!(path = ?list_path, error = %e, "Failed to remove concat list");
    }
    result?;

    info!(
        path = ?destination,
        sources = artifacts.len(),
        "Merged chunk files"
    );
    Ok(MergeOutcome::Merged {
        path: destination.to_path_buf(),
        sources: artifacts,
    })
}

async fn ensure_tool(program: &str) -> Result<(), MergeError> {
    let status = Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(MergeError::ToolMissing(program.to_string())),
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            Err(MergeError::ToolMissing(program.to_string()))
        }
        Err(e) => Err(MergeError::Io(e)),
    }
}

async fn run_concat(
    list_path: &Path,
    destination: &Path,
    settings: &MergeSettings,
) -> Result<(), MergeError> {
    let child = Command::new(&settings.ffmpeg_path)
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
        .arg(list_path)
        .args(["-c", "copy"])
        .arg(destination)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(
        Duration::from_secs(settings.timeout_secs),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| MergeError::TimedOut(settings.timeout_secs))??;

    if !output.status.success() {
        return Err(MergeError::ToolFailed {
            code: output.status.code().unwrap_or(1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn concat_list_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".concat.txt");
    destination.with_file_name(name)
}

/// ffmpeg concat demuxer input. Single quotes inside a path are closed,
/// escaped, and reopened.
fn concat_list(sources: &[PathBuf]) -> String {
    sources
        .iter()
        .map(|source| {
            let path = source.to_string_lossy().replace('\'', r"'\''");
            format!("file '{path}'\n")
        })
        .collect()
}
