use anyhow::{Context, Result};
use clap::Parser;
use narrate_core::pipeline::{merge_artifacts, MergeOutcome, RunControl, RunOutcome, UsageCounters};
use narrate_core::settings::{Settings, SettingsManager};
use narrate_core::synthesis::Voice;
use narrate_core::SplitMode;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod output;
mod progress;

use crate::output::{print_json, print_text, RunSummary};
use crate::progress::ProgressObserver;

const EXIT_DOCUMENT_TOO_LONG: u8 = 2;
const EXIT_NO_FILES_GENERATED: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Narrate - turn long text into speech, one chunk at a time")]
struct Args {
    /// Text to narrate
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    text: Option<String>,

    /// Read the text to narrate from a file
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Directory receiving chunk_<n> audio files
    #[arg(long, short = 'o', value_name = "DIR", default_value = "narration")]
    output_dir: PathBuf,

    #[arg(long)]
    voice: Option<Voice>,

    /// Style instructions sent with every chunk
    #[arg(long)]
    instructions: Option<String>,

    #[arg(long)]
    speed: Option<f32>,

    #[arg(long)]
    pitch: Option<f32>,

    #[arg(long)]
    volume: Option<f32>,

    /// Maximum characters per chunk
    #[arg(long)]
    max_chunk_len: Option<i64>,

    /// fixed or words
    #[arg(long)]
    split_mode: Option<SplitMode>,

    /// Chunks synthesized at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Concatenate chunk files into one with ffmpeg
    #[arg(long)]
    merge: bool,

    /// Load settings from a specific profile
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// Per-attempt timeout for the speech request
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(voice) = self.voice {
            settings.voice = voice;
        }
        if let Some(instructions) = &self.instructions {
            settings.instructions = instructions.clone();
        }
        if self.speed.is_some() {
            settings.speech.speed = self.speed;
        }
        if self.pitch.is_some() {
            settings.speech.pitch = self.pitch;
        }
        if self.volume.is_some() {
            settings.speech.volume = self.volume;
        }
        if let Some(len) = self.max_chunk_len {
            settings.max_chunk_len = len;
        }
        if let Some(mode) = self.split_mode {
            settings.split_mode = mode;
        }
        if let Some(concurrency) = self.concurrency {
            settings.max_concurrency = concurrency;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if self.merge {
            settings.merge.enabled = true;
        }
    }
}

fn main() -> Result<ExitCode> {
    setup_tracing()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<ExitCode> {
    let args = Args::parse();

    info!(
        "CLI startup: profile={:?}, output_dir={:?}, json={}",
        args.profile, args.output_dir, args.json
    );

    let settings_manager = match &args.profile {
        Some(name) => SettingsManager::from_profile(name)?,
        None => SettingsManager::new()?,
    };
    settings_manager.update_setting(|settings| {
        settings.apply_env_overrides();
        args.apply_to(settings);
    });
    let settings = settings_manager.settings();
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid settings in {:?}: {e}", settings_manager.path()))?;

    let document = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?,
        (None, None) => anyhow::bail!("Either --text or --file is required"),
    };

    let length = document.chars().count();
    if length > settings.max_document_chars {
        eprintln!(
            "DOCUMENT_TOO_LONG: document has {length} characters, the limit is {}",
            settings.max_document_chars
        );
        return Ok(ExitCode::from(EXIT_DOCUMENT_TOO_LONG));
    }

    let usage = Arc::new(UsageCounters::new());
    let observer = ProgressObserver::new(usage.clone(), !args.json)?;
    let pipeline = narrate_core::build_pipeline(&settings)?.with_observer(Arc::new(observer));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            let _ = cancel_tx.send(true);
        }
    });

    let report = pipeline
        .run_with(
            &document,
            &args.output_dir,
            settings.voice,
            &settings.instructions,
            RunControl::new().with_cancel(cancel_rx),
        )
        .await?;

    let mut merge_error = None;
    let merged = if settings.merge.enabled && !report.artifacts.is_empty() {
        let extension = report.artifacts[0]
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");
        let destination = args.output_dir.join(format!("narration.{extension}"));
        match merge_artifacts(report.artifacts.clone(), &destination, &settings.merge).await {
            Ok(MergeOutcome::Merged { path, .. }) => Some(path),
            Ok(MergeOutcome::Skipped(_)) => None,
            Err(e) => {
                merge_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    let summary = RunSummary {
        report: &report,
        outcome: report.outcome(),
        usage: usage.snapshot(),
        merged,
    };
    if args.json {
        print_json(&summary)?;
    } else {
        print_text(&summary);
    }

    if report.outcome() == RunOutcome::AllFailed {
        eprintln!("NO_FILES_GENERATED: every chunk failed to synthesize");
        return Ok(ExitCode::from(EXIT_NO_FILES_GENERATED));
    }
    if let Some(e) = merge_error {
        return Err(e).context("Failed to merge chunk files");
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create trace directory in user's home
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    let trace_dir = home.join(".narrate").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("narrate.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    Ok(())
}
