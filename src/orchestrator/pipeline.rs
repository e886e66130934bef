//! Pipeline runner that executes steps in sequence.

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Pipeline that runs a sequence of steps for one segment job.
///
/// Steps execute strictly in order, with validation before and after each.
/// The first failing step aborts the job; there is no retry and no
/// cancellation of a running step.
pub struct Pipeline {
    /// Steps to execute in order.
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add a step to the pipeline.
    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run the pipeline with the given context and state.
    ///
    /// Executes each step in order: `validate_input`, `execute`, then
    /// `validate_output` when execute returned `Success`.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        };

        for step in self.steps.iter() {
            let step_name = step.name();
            ctx.logger.phase(step_name);

            ctx.logger
                .debug(&format!("Validating input for '{}'", step_name));
            if let Err(e) = step.validate_input(ctx) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(ctx.job_name(), step_name, e));
            }

            let outcome = step.execute(ctx, state).map_err(|e| {
                ctx.logger.error(&format!("Execution failed: {}", e));
                ctx.logger.show_tail(step_name);
                PipelineError::step_failed(ctx.job_name(), step_name, e)
            })?;

            match outcome {
                StepOutcome::Success => {
                    if let Err(e) = step.validate_output(ctx, state) {
                        ctx.logger
                            .error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(ctx.job_name(), step_name, e));
                    }
                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger
                        .info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }
        }

        ctx.logger.success("Segment pipeline completed");
        Ok(result)
    }

    /// Get the number of steps in the pipeline.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// Steps that completed successfully.
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    /// Check if all steps completed (none skipped).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    /// Total number of steps that ran.
    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{JobLogger, LogConfig};
    use crate::models::Segment;
    use crate::orchestrator::errors::StepError;
    use crate::stages::{StageRegistry, StageRunner};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_context(dir: &std::path::Path) -> Context {
        Context {
            segment: Segment::new(dir.join("seg_001.wav"), 0),
            work_dir: dir.to_path_buf(),
            runner: StageRunner::new(Arc::new(StageRegistry::new())),
            logger: Arc::new(JobLogger::new("seg_001", dir, LogConfig::default()).unwrap()),
            use_changepoint: false,
            concurrency_hint: 1,
        }
    }

    struct CountingStep {
        name: &'static str,
        execute_count: Arc<AtomicUsize>,
        fail: bool,
        skip: bool,
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context) -> Result<(), StepError> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> Result<StepOutcome, StepError> {
            self.execute_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StepError::other("forced failure"));
            }
            if self.skip {
                return Ok(StepOutcome::Skipped("disabled".to_string()));
            }
            Ok(StepOutcome::Success)
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> Result<(), StepError> {
            Ok(())
        }
    }

    #[test]
    fn pipeline_builds_correctly() {
        let pipeline = Pipeline::new()
            .with_step(CountingStep {
                name: "Detect",
                execute_count: Arc::new(AtomicUsize::new(0)),
                fail: false,
                skip: false,
            })
            .with_step(CountingStep {
                name: "Cluster",
                execute_count: Arc::new(AtomicUsize::new(0)),
                fail: false,
                skip: false,
            });

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Detect", "Cluster"]);
    }

    #[test]
    fn failing_step_stops_later_steps() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("seg_001");

        let after_failure = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep {
                name: "Detect",
                execute_count: Arc::new(AtomicUsize::new(0)),
                fail: true,
                skip: false,
            })
            .with_step(CountingStep {
                name: "Cluster",
                execute_count: Arc::clone(&after_failure),
                fail: false,
                skip: false,
            });

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(err.to_string().contains("Detect"));
        // The step after the failure never executed.
        assert_eq!(after_failure.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skipped_steps_are_recorded() {
        let dir = tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("seg_001");

        let pipeline = Pipeline::new()
            .with_step(CountingStep {
                name: "Detect",
                execute_count: Arc::new(AtomicUsize::new(0)),
                fail: false,
                skip: false,
            })
            .with_step(CountingStep {
                name: "ChangePoint",
                execute_count: Arc::new(AtomicUsize::new(0)),
                fail: false,
                skip: true,
            });

        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(result.steps_completed, vec!["Detect"]);
        assert_eq!(result.steps_skipped, vec!["ChangePoint"]);
        assert!(!result.all_completed());
        assert_eq!(result.total_steps(), 2);
    }
}
