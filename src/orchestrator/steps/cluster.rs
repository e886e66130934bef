//! Cluster step - speaker clustering on one segment.
//!
//! Consumes the working segmentation (change-point output when that stage
//! ran, otherwise the detection output) and tells the clusterer which one
//! it got, since that affects its merge strategy. Produces the job's final
//! clustered segmentation artifact.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{ClusterOutput, Context, JobState, StepOutcome};
use crate::stages::StageId;

use super::CLUSTERED_SEG_SUFFIX;

/// Speaker clustering step.
pub struct ClusterStep;

impl ClusterStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClusterStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ClusterStep {
    fn name(&self) -> &str {
        "Cluster"
    }

    fn description(&self) -> &str {
        "Speaker clustering"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.segment.path.exists() {
            return Err(StepError::file_not_found(
                ctx.segment.path.display().to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let input_seg = state
            .working_segmentation()
            .ok_or_else(|| StepError::invalid_input("no working segmentation to cluster"))?
            .to_path_buf();

        let changepoint_used = if state.changepoint.is_some() { "1" } else { "0" };
        let out_seg = ctx.artifact_path(CLUSTERED_SEG_SUFFIX);

        let args = vec![
            ctx.segment.path.display().to_string(),
            input_seg.display().to_string(),
            changepoint_used.to_string(),
            ctx.work_dir.display().to_string(),
            ctx.concurrency_hint.to_string(),
        ];
        ctx.runner
            .run(StageId::Cluster, &args, &ctx.work_dir, &ctx.logger)?;

        state.cluster = Some(ClusterOutput { seg_path: out_seg });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let Some(ref cluster) = state.cluster else {
            return Err(StepError::invalid_output("cluster output not recorded"));
        };
        if !cluster.seg_path.exists() {
            return Err(StepError::invalid_output(format!(
                "clusterer produced no artifact at {}",
                cluster.seg_path.display()
            )));
        }
        let size = std::fs::metadata(&cluster.seg_path)
            .map_err(|e| {
                StepError::io_error(
                    format!("reading metadata of {}", cluster.seg_path.display()),
                    e,
                )
            })?
            .len();
        if size == 0 {
            return Err(StepError::invalid_output(format!(
                "clustered segmentation is empty: {}",
                cluster.seg_path.display()
            )));
        }
        Ok(())
    }
}
