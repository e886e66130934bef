//! Pipeline step trait definition.
//!
//! All segment pipeline steps implement this trait, providing a consistent
//! interface for validation and execution.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// Trait for segment pipeline steps.
///
/// The pipeline runner calls these methods in order:
///
/// 1. `validate_input` - check preconditions before execution
/// 2. `execute` - run the stage and record its output in the state
/// 3. `validate_output` - verify the step produced a valid artifact
pub trait PipelineStep: Send + Sync {
    /// Get the step name (for logging and error context).
    fn name(&self) -> &str;

    /// Validate inputs before execution.
    ///
    /// Should check that all required preconditions are met (segment file
    /// exists, working directory present, and so on).
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Execute the step's main work.
    ///
    /// Returns `StepOutcome::Success` on completion, or
    /// `StepOutcome::Skipped` if the step determined it should be skipped
    /// (not an error).
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Validate outputs after execution.
    ///
    /// Called after `execute` returns `Success`. Should verify the step's
    /// artifact exists and its state section is populated.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Whether this step can be skipped based on run configuration.
    ///
    /// Default is `false` (step is required).
    fn is_optional(&self) -> bool {
        false
    }

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}
