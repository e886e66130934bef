//! Detect step - speech/silence detection on one segment.
//!
//! Always the first stage of a segment job. Its output is the baseline
//! segmentation every later stage refines or consumes.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, DetectOutput, JobState, StepOutcome};
use crate::stages::StageId;

use super::SPEECH_SEG_SUFFIX;

/// Speech/silence detection step.
pub struct DetectStep;

impl DetectStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DetectStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for DetectStep {
    fn name(&self) -> &str {
        "Detect"
    }

    fn description(&self) -> &str {
        "Speech/silence detection"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if !ctx.segment.path.exists() {
            return Err(StepError::file_not_found(
                ctx.segment.path.display().to_string(),
            ));
        }
        if !ctx.work_dir.exists() {
            return Err(StepError::invalid_input(format!(
                "job work directory missing: {}",
                ctx.work_dir.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let out_seg = ctx.artifact_path(SPEECH_SEG_SUFFIX);

        let args = vec![
            ctx.segment.path.display().to_string(),
            out_seg.display().to_string(),
            ctx.work_dir.display().to_string(),
            ctx.concurrency_hint.to_string(),
        ];
        ctx.runner
            .run(StageId::Detect, &args, &ctx.work_dir, &ctx.logger)?;

        state.detect = Some(DetectOutput { seg_path: out_seg });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let Some(ref detect) = state.detect else {
            return Err(StepError::invalid_output("detection output not recorded"));
        };
        if !detect.seg_path.exists() {
            return Err(StepError::invalid_output(format!(
                "detector produced no segmentation at {}",
                detect.seg_path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_step_has_correct_name() {
        let step = DetectStep::new();
        assert_eq!(step.name(), "Detect");
        assert!(!step.is_optional());
    }
}
