//! Admission-controlled scheduler for segment jobs.
//!
//! Launches one worker thread per segment and keeps the number of running
//! jobs at or under a configured limit by sampling the job board on a
//! fixed interval. This is coarse admission control, not an exact
//! semaphore: a job that transitions from pending to running between two
//! poll ticks can briefly push the count past the limit, which is accepted
//! by contract. After the last launch the scheduler joins every worker
//! before returning (join-all barrier). There is no work-stealing, no
//! priority, and no cancellation of a running job.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::fsops;
use crate::logging::{JobLogger, LogConfig};
use crate::models::Segment;
use crate::stages::{StageRegistry, StageRunner};

use super::board::JobBoard;
use super::create_segment_pipeline;
use super::errors::{PipelineError, PipelineResult, StepError};
use super::pipeline::PipelineRunResult;
use super::types::{Context, JobState};

/// Result of processing a single segment job.
#[derive(Debug, Clone)]
pub struct JobResult {
    /// Segment base name.
    pub segment: String,
    /// Whether the job completed successfully.
    pub success: bool,
    /// Path to the clustered segmentation artifact (if successful).
    pub clustered_seg: Option<PathBuf>,
    /// Path to the job's log file (if the job got far enough to open one).
    pub log_path: Option<PathBuf>,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Steps that completed.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
}

impl JobResult {
    /// Create a successful result.
    pub fn success(
        segment: impl Into<String>,
        clustered_seg: PathBuf,
        log_path: PathBuf,
        run_result: PipelineRunResult,
    ) -> Self {
        Self {
            segment: segment.into(),
            success: true,
            clustered_seg: Some(clustered_seg),
            log_path: Some(log_path),
            error: None,
            steps_completed: run_result.steps_completed,
            steps_skipped: run_result.steps_skipped,
        }
    }

    /// Create a failed result.
    pub fn failure(segment: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            success: false,
            clustered_seg: None,
            log_path: None,
            error: Some(error.into()),
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        }
    }
}

/// Runs one segment job end to end: private work directory, job log,
/// segment pipeline, board transitions.
#[derive(Clone)]
pub struct JobRunner {
    /// Root under which every job gets its own subdirectory.
    pub jobs_root: PathBuf,
    /// Stage registry shared by all jobs.
    pub registry: Arc<StageRegistry>,
    /// Run the change-point segmentation stage.
    pub use_changepoint: bool,
    /// Concurrency hint forwarded to stages.
    pub concurrency_hint: u32,
    /// Job log configuration.
    pub log_config: LogConfig,
}

impl JobRunner {
    /// Process one segment, publishing transitions on the board.
    ///
    /// A failure is terminal for this job only; the error is captured in
    /// the returned result and the run continues without this segment.
    pub fn run_job(&self, segment: Segment, board: JobBoard) -> JobResult {
        board.mark_running(&segment.base_name);

        match self.run_pipeline(&segment) {
            Ok((clustered, run_result, log_path)) => {
                board.mark_done(&segment.base_name);
                JobResult::success(&segment.base_name, clustered, log_path, run_result)
            }
            Err(e) => {
                board.mark_failed(&segment.base_name);
                tracing::warn!(segment = %segment.base_name, "segment job failed: {e}");
                JobResult::failure(&segment.base_name, e.to_string())
            }
        }
    }

    fn work_dir_for(&self, segment: &Segment) -> PathBuf {
        self.jobs_root.join(&segment.base_name)
    }

    fn run_pipeline(
        &self,
        segment: &Segment,
    ) -> PipelineResult<(PathBuf, PipelineRunResult, PathBuf)> {
        let work_dir = self.work_dir_for(segment);

        // A stale directory from a previous run must not leak artifacts
        // into this one.
        if work_dir.exists() {
            fsops::remove(&work_dir)
                .map_err(|e| PipelineError::setup_failed(&segment.base_name, e.to_string()))?;
        }
        fs::create_dir_all(&work_dir)
            .map_err(|e| PipelineError::setup_failed(&segment.base_name, e.to_string()))?;

        let logger = Arc::new(
            JobLogger::new(&segment.base_name, &work_dir, self.log_config.clone())
                .map_err(|e| PipelineError::setup_failed(&segment.base_name, e.to_string()))?,
        );
        let log_path = logger.log_path().to_path_buf();

        let ctx = Context {
            segment: segment.clone(),
            work_dir,
            runner: StageRunner::new(Arc::clone(&self.registry)),
            logger,
            use_changepoint: self.use_changepoint,
            concurrency_hint: self.concurrency_hint,
        };

        let mut state = JobState::new(&segment.base_name);
        let run_result = create_segment_pipeline().run(&ctx, &mut state)?;

        // A job only counts as done with its clustered artifact in hand.
        let clustered = state.cluster.map(|c| c.seg_path).ok_or_else(|| {
            PipelineError::step_failed(
                &segment.base_name,
                "Cluster",
                StepError::invalid_output("no clustered segmentation recorded"),
            )
        })?;

        Ok((clustered, run_result, log_path))
    }
}

/// Admission-controlled launcher with a join-all barrier.
pub struct Scheduler {
    board: JobBoard,
    max_jobs: usize,
    poll_interval: Duration,
}

impl Scheduler {
    /// Create a scheduler with the given concurrency limit (clamped to at
    /// least 1) and poll interval.
    pub fn new(max_jobs: u32, poll_interval: Duration) -> Self {
        Self {
            board: JobBoard::new(),
            max_jobs: max_jobs.max(1) as usize,
            poll_interval,
        }
    }

    /// Get the job board.
    pub fn board(&self) -> &JobBoard {
        &self.board
    }

    /// Launch one worker per segment, holding launches while the running
    /// count is at or above the limit, then join every worker.
    ///
    /// The worker is responsible for publishing its own Running and
    /// terminal transitions on the board it receives.
    pub fn run<F>(&self, segments: Vec<Segment>, worker: F) -> Vec<JobResult>
    where
        F: Fn(Segment, JobBoard) -> JobResult + Send + Sync + Clone + 'static,
    {
        let total = segments.len();
        let mut handles = Vec::with_capacity(total);

        for segment in segments {
            self.board.register(&segment.base_name);

            let worker = worker.clone();
            let board = self.board.clone();
            let name = segment.base_name.clone();
            tracing::info!(segment = %name, "launching segment job");

            handles.push(thread::spawn(move || worker(segment, board)));

            // Soft cap: hold further launches while at capacity.
            while self.board.running_count() >= self.max_jobs {
                thread::sleep(self.poll_interval);
            }
        }

        // Final barrier: every launched job reaches a terminal state
        // before control returns to the orchestrator.
        let mut results = Vec::with_capacity(total);
        for handle in handles {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(_) => {
                    tracing::error!("segment worker panicked");
                    results.push(JobResult::failure("<unknown>", "worker thread panicked"));
                }
            }
        }

        tracing::info!(
            total,
            done = self.board.counts().done,
            failed = self.board.counts().failed,
            "all segment jobs terminal"
        );
        results
    }
}
