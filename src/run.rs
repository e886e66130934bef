//! Top-level run orchestration.
//!
//! A run takes one recording end to end: preflight, fresh working tree,
//! split into fixed-duration segments, one pipeline job per segment under
//! the concurrency limit, then aggregation into the final segmentation
//! which is copied to the requested output path. Job outcomes are recorded
//! in `run_report.json` at the working root as soon as the jobs finish, so
//! the record survives an aggregation failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::aggregate::{self, AggregateError, Aggregator};
use crate::config::Settings;
use crate::fsops::{self, FsError};
use crate::logging::{JobLogger, LogConfig};
use crate::models::{Recording, Segment};
use crate::orchestrator::{JobResult, JobRunner, Scheduler};
use crate::stages::{probe_recording, PreflightError, StageError, StageId, StageRegistry, StageRunner};

/// Directory under the working root holding the split segment files.
pub const SEGMENTS_DIR: &str = "blind_segmentation";
/// Directory under the working root holding per-job work directories.
pub const JOBS_DIR: &str = "work_split_approach";
/// Name of the run report file at the working root.
pub const RUN_REPORT_FILE: &str = "run_report.json";

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The splitter ran but produced no segment files.
    #[error("splitter produced no segments in {dir}")]
    NoSegments { dir: PathBuf },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl RunError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for run operations.
pub type RunResult<T> = Result<T, RunError>;

/// Everything a run needs, settings and CLI already merged.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The recording to diarize.
    pub recording: PathBuf,
    /// Where the final segmentation is copied.
    pub output: PathBuf,
    /// Working root, exclusively owned by this run.
    pub work_root: PathBuf,
    /// Run the change-point segmentation stage.
    pub use_changepoint: bool,
    /// Concurrency limit for segment jobs.
    pub concurrency: u32,
    /// Fixed segment duration handed to the splitter, in seconds.
    pub segment_duration_secs: u32,
    /// Scheduler poll interval while at capacity.
    pub poll_interval_ms: u64,
    /// Stage executable directory; empty means $PATH lookup.
    pub stage_dir: String,
    /// Job log configuration.
    pub log_config: LogConfig,
}

impl RunOptions {
    /// Build options from settings, with the per-invocation paths supplied
    /// by the caller.
    pub fn from_settings(
        settings: &Settings,
        recording: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            recording: recording.into(),
            output: output.into(),
            work_root: PathBuf::from(&settings.paths.work_root),
            use_changepoint: settings.pipeline.use_changepoint,
            concurrency: settings.pipeline.concurrency,
            segment_duration_secs: settings.pipeline.segment_duration_secs,
            poll_interval_ms: settings.pipeline.poll_interval_ms,
            stage_dir: settings.paths.stage_dir.clone(),
            log_config: LogConfig {
                error_tail: settings.logging.error_tail as usize,
                show_timestamps: settings.logging.show_timestamps,
                ..LogConfig::default()
            },
        }
    }
}

/// One failed segment job in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    /// Segment base name.
    pub segment: String,
    /// Failure description.
    pub error: String,
}

/// Durable record of a run's job outcomes, written at the working root.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Path of the recording.
    pub recording: String,
    /// Probed duration in seconds.
    pub duration_secs: f64,
    /// Probed sample rate in Hz.
    pub sample_rate: u32,
    /// Whether the change-point stage was enabled.
    pub use_changepoint: bool,
    /// Number of segments the splitter produced.
    pub segments_total: usize,
    /// Segments whose pipeline completed.
    pub jobs_done: usize,
    /// Segments whose pipeline failed, with reasons.
    pub jobs_failed: Vec<JobFailure>,
    /// When the run started (RFC 3339).
    pub started_at: String,
    /// When the jobs finished (RFC 3339).
    pub finished_at: String,
}

/// Summary returned to the caller after a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Recording base name.
    pub recording: String,
    /// Number of segments processed.
    pub segments_total: usize,
    /// Jobs that completed.
    pub jobs_done: usize,
    /// Jobs that failed. Their segments are absent from the output.
    pub jobs_failed: usize,
    /// The delivered output path.
    pub output: PathBuf,
    /// Path of the run report.
    pub report_path: PathBuf,
}

/// Execute a full run.
pub fn execute_run(options: &RunOptions) -> RunResult<RunSummary> {
    let started_at = chrono::Local::now().to_rfc3339();

    let registry = Arc::new(StageRegistry::from_stage_dir_setting(&options.stage_dir));
    registry.preflight(options.use_changepoint)?;

    let props = probe_recording(&registry, &options.recording)?;
    let recording = Recording::new(&options.recording, props);
    tracing::info!(
        recording = %recording.base_name,
        duration_secs = props.duration_secs,
        sample_rate = props.sample_rate,
        "probed recording"
    );

    // The run owns its working root; any leftover from a previous run is
    // removed before anything is written.
    fsops::safe_remove(&options.work_root, false)?;

    let segments_dir = options.work_root.join(SEGMENTS_DIR);
    let jobs_root = options.work_root.join(JOBS_DIR).join(&recording.base_name);
    for dir in [&segments_dir, &jobs_root] {
        fs::create_dir_all(dir)
            .map_err(|e| RunError::io(format!("creating {}", dir.display()), e))?;
    }

    let run_logger = JobLogger::new("run", &options.work_root, options.log_config.clone())
        .map_err(|e| RunError::io("opening run log".to_string(), e))?;
    run_logger.section(&format!("Run: {}", recording.base_name));
    run_logger.info(&format!(
        "Recording {} ({:.1}s at {} Hz), segment duration {}s, concurrency {}",
        recording.path.display(),
        recording.duration_secs,
        recording.sample_rate,
        options.segment_duration_secs,
        options.concurrency
    ));

    let runner = StageRunner::new(Arc::clone(&registry));

    // Split the recording into fixed-duration segment files.
    run_logger.phase("Split");
    let args = vec![
        recording.path.display().to_string(),
        segments_dir.display().to_string(),
        options.segment_duration_secs.to_string(),
    ];
    runner.run(StageId::Split, &args, &options.work_root, &run_logger)?;

    let segments = enumerate_segments(&segments_dir)?;
    if segments.is_empty() {
        return Err(RunError::NoSegments { dir: segments_dir });
    }
    run_logger.info(&format!("Split produced {} segments", segments.len()));

    // One pipeline job per segment, under the admission limit.
    run_logger.phase("Segment jobs");
    let scheduler = Scheduler::new(
        options.concurrency,
        Duration::from_millis(options.poll_interval_ms),
    );
    let job_runner = JobRunner {
        jobs_root: jobs_root.clone(),
        registry: Arc::clone(&registry),
        use_changepoint: options.use_changepoint,
        concurrency_hint: options.concurrency,
        log_config: options.log_config.clone(),
    };
    let segments_total = segments.len();
    let worker = job_runner.clone();
    let results = scheduler.run(segments, move |segment, board| {
        worker.run_job(segment, board)
    });

    let report = build_report(&recording, options, segments_total, &results, started_at);
    for failure in &report.jobs_failed {
        run_logger.warn(&format!(
            "Segment {} failed and is excluded from the output: {}",
            failure.segment, failure.error
        ));
    }
    run_logger.info(&format!(
        "Jobs finished: {} done, {} failed",
        report.jobs_done,
        report.jobs_failed.len()
    ));

    // Jobs are the expensive part; their record is persisted before
    // aggregation can fail.
    let report_path = write_report(&options.work_root, &report)?;

    let artifacts = aggregate::collect_artifacts(&jobs_root)?;
    let aggregator = Aggregator::new(runner, &options.work_root, &recording.path);
    let output = aggregator.run(&artifacts, &run_logger)?;

    aggregate::deliver_final(&output.final_seg, &options.output)?;
    run_logger.success(&format!("Delivered {}", options.output.display()));
    run_logger.flush();

    Ok(RunSummary {
        recording: recording.base_name,
        segments_total,
        jobs_done: report.jobs_done,
        jobs_failed: report.jobs_failed.len(),
        output: options.output.clone(),
        report_path,
    })
}

/// List the segment files the splitter produced, in name order.
///
/// Name order is split order: the splitter numbers segments with a
/// fixed-width index.
fn enumerate_segments(segments_dir: &Path) -> RunResult<Vec<Segment>> {
    let entries = fs::read_dir(segments_dir)
        .map_err(|e| RunError::io(format!("reading {}", segments_dir.display()), e))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| RunError::io(format!("reading entry in {}", segments_dir.display()), e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("wav") {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| Segment::new(path, index))
        .collect())
}

fn build_report(
    recording: &Recording,
    options: &RunOptions,
    segments_total: usize,
    results: &[JobResult],
    started_at: String,
) -> RunReport {
    let jobs_done = results.iter().filter(|r| r.success).count();
    let jobs_failed = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| JobFailure {
            segment: r.segment.clone(),
            error: r
                .error
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string()),
        })
        .collect();

    RunReport {
        recording: recording.path.display().to_string(),
        duration_secs: recording.duration_secs,
        sample_rate: recording.sample_rate,
        use_changepoint: options.use_changepoint,
        segments_total,
        jobs_done,
        jobs_failed,
        started_at,
        finished_at: chrono::Local::now().to_rfc3339(),
    }
}

fn write_report(work_root: &Path, report: &RunReport) -> RunResult<PathBuf> {
    let path = work_root.join(RUN_REPORT_FILE);
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| RunError::io("serializing run report".to_string(), e.into()))?;
    fs::write(&path, json)
        .map_err(|e| RunError::io(format!("writing {}", path.display()), e))?;
    Ok(path)
}
