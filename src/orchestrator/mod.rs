//! Per-segment pipeline orchestration.
//!
//! A segment job runs a fixed sequence of steps (detect, optional
//! change-point refinement, cluster) inside a private work directory.
//! The scheduler launches one job per segment under an admission limit
//! and the board publishes each job's lifecycle to observers.

pub mod board;
pub mod errors;
pub mod pipeline;
pub mod scheduler;
pub mod step;
pub mod steps;
pub mod types;

pub use board::{BoardCounts, JobBoard, JobStatus};
pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use scheduler::{JobResult, JobRunner, Scheduler};
pub use step::PipelineStep;
pub use types::{Context, JobState, StepOutcome};

use steps::{ChangePointStep, ClusterStep, DetectStep};

/// Build the standard segment pipeline.
///
/// The change-point step is always present; it skips itself at run time
/// when the context disables it, so step numbering stays stable in logs.
pub fn create_segment_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(DetectStep::new())
        .with_step(ChangePointStep::new())
        .with_step(ClusterStep::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_order() {
        let pipeline = create_segment_pipeline();
        assert_eq!(pipeline.step_names(), vec!["Detect", "ChangePoint", "Cluster"]);
    }
}
