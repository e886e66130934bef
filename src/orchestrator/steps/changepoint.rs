//! ChangePoint step - optional BIC segmentation refinement.
//!
//! Refines the speech/silence boundaries into finer speaker-change points
//! before clustering. Skipped entirely when the run disables it; in that
//! case the clustering stage consumes the detection output directly.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{ChangePointOutput, Context, JobState, StepOutcome};
use crate::stages::StageId;

use super::CHANGEPOINT_SEG_SUFFIX;

/// Mode flag handed to the change-point segmenter.
const CHANGEPOINT_MODE: &str = "bic";

/// Change-point (BIC) segmentation step.
pub struct ChangePointStep;

impl ChangePointStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChangePointStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ChangePointStep {
    fn name(&self) -> &str {
        "ChangePoint"
    }

    fn description(&self) -> &str {
        "Change-point (BIC) segmentation"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.use_changepoint && !ctx.segment.path.exists() {
            return Err(StepError::file_not_found(
                ctx.segment.path.display().to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if !ctx.use_changepoint {
            return Ok(StepOutcome::Skipped(
                "change-point segmentation disabled for this run".to_string(),
            ));
        }

        let input_seg = state
            .detect
            .as_ref()
            .map(|d| d.seg_path.clone())
            .ok_or_else(|| StepError::invalid_input("detection output missing"))?;

        let out_seg = ctx.artifact_path(CHANGEPOINT_SEG_SUFFIX);

        let args = vec![
            ctx.segment.path.display().to_string(),
            out_seg.display().to_string(),
            ctx.work_dir.display().to_string(),
            input_seg.display().to_string(),
            CHANGEPOINT_MODE.to_string(),
        ];
        ctx.runner
            .run(StageId::ChangePoint, &args, &ctx.work_dir, &ctx.logger)?;

        state.changepoint = Some(ChangePointOutput { seg_path: out_seg });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let Some(ref cp) = state.changepoint else {
            return Err(StepError::invalid_output(
                "change-point output not recorded",
            ));
        };
        if !cp.seg_path.exists() {
            return Err(StepError::invalid_output(format!(
                "change-point segmenter produced no segmentation at {}",
                cp.seg_path.display()
            )));
        }
        Ok(())
    }

    fn is_optional(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changepoint_step_is_optional() {
        let step = ChangePointStep::new();
        assert_eq!(step.name(), "ChangePoint");
        assert!(step.is_optional());
    }
}
