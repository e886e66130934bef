//! Core types for the segment pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::logging::JobLogger;
use crate::models::Segment;
use crate::stages::StageRunner;

/// Read-only context passed to pipeline steps.
///
/// Contains the job configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    /// The segment this job processes.
    pub segment: Segment,
    /// Job-private working directory.
    pub work_dir: PathBuf,
    /// Runner for the external stages.
    pub runner: StageRunner,
    /// Per-job logger; all stages of the job append here.
    pub logger: Arc<JobLogger>,
    /// Whether the change-point segmentation stage runs for this run.
    pub use_changepoint: bool,
    /// Concurrency hint passed through to stages that parallelize
    /// internally.
    pub concurrency_hint: u32,
}

impl Context {
    /// Name identifying the job in logs and errors.
    pub fn job_name(&self) -> &str {
        &self.segment.base_name
    }

    /// Path of an artifact in the job's working directory, named
    /// `<segment base name><suffix>`.
    pub fn artifact_path(&self, suffix: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}{}", self.segment.base_name, suffix))
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// Steps add their own output section and never overwrite another step's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Job identifier (segment base name).
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    /// Speech/silence detection output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detect: Option<DetectOutput>,
    /// Change-point segmentation output (absent when the stage is skipped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changepoint: Option<ChangePointOutput>,
    /// Clustering output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterOutput>,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Check if detection has completed.
    pub fn has_detect(&self) -> bool {
        self.detect.is_some()
    }

    /// The segmentation the clustering stage should consume: the
    /// change-point output when present, otherwise the detection output.
    /// No copy is made when change-point segmentation is skipped; this is
    /// a reference to the same file.
    pub fn working_segmentation(&self) -> Option<&Path> {
        self.changepoint
            .as_ref()
            .map(|c| c.seg_path.as_path())
            .or_else(|| self.detect.as_ref().map(|d| d.seg_path.as_path()))
    }
}

/// Output of the speech/silence detection step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectOutput {
    /// Path to the speech/silence segmentation file.
    pub seg_path: PathBuf,
}

/// Output of the change-point segmentation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePointOutput {
    /// Path to the refined segmentation file.
    pub seg_path: PathBuf,
}

/// Output of the clustering step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterOutput {
    /// Path to the clustered segmentation artifact.
    pub seg_path: PathBuf,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (not an error).
    Skipped(String),
}
