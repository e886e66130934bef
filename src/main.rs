//! diarsplit command line entry point.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use diarsplit::config::{ConfigManager, Settings};
use diarsplit::run::{execute_run, RunOptions};

/// Split-and-merge speaker diarization orchestrator.
#[derive(Parser, Debug)]
#[command(name = "diarsplit", version, about)]
struct Cli {
    /// Recording to diarize.
    recording: PathBuf,

    /// Where the final segmentation is written.
    output: PathBuf,

    /// Working root for this run (removed and recreated).
    #[arg(long)]
    work_root: Option<PathBuf>,

    /// Concurrency limit for segment jobs.
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<u32>,

    /// Enable change-point (BIC) segmentation before clustering.
    #[arg(long)]
    bic: bool,

    /// Segment duration in seconds.
    #[arg(long)]
    segment_duration: Option<u32>,

    /// Directory holding the stage executables (default: $PATH lookup).
    #[arg(long)]
    stage_dir: Option<PathBuf>,

    /// Config file, created with defaults if missing.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(config_path) => {
            let mut manager = ConfigManager::new(config_path);
            manager
                .load_or_create()
                .with_context(|| format!("loading config {}", config_path.display()))?;
            manager.settings().clone()
        }
        None => Settings::default(),
    };

    let mut options = RunOptions::from_settings(&settings, &cli.recording, &cli.output);
    if let Some(work_root) = cli.work_root {
        options.work_root = work_root;
    }
    if let Some(jobs) = cli.jobs {
        options.concurrency = jobs.max(1);
    }
    if cli.bic {
        options.use_changepoint = true;
    }
    if let Some(duration) = cli.segment_duration {
        options.segment_duration_secs = duration;
    }
    if let Some(stage_dir) = cli.stage_dir {
        options.stage_dir = stage_dir.display().to_string();
    }

    let summary = execute_run(&options).context("run failed")?;

    tracing::info!(
        recording = %summary.recording,
        segments = summary.segments_total,
        done = summary.jobs_done,
        failed = summary.jobs_failed,
        "run complete"
    );
    println!("{}", summary.output.display());
    if summary.jobs_failed > 0 {
        eprintln!(
            "warning: {} of {} segments failed; see {}",
            summary.jobs_failed,
            summary.segments_total,
            summary.report_path.display()
        );
    }
    Ok(())
}
