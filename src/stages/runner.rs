//! Low-level stage invocation.
//!
//! Runs one external stage to completion and appends its combined
//! stdout/stderr to the owning job's log. The runner never retries and
//! never interprets stage-specific output; a non-zero exit status is the
//! only failure signal it understands.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use crate::logging::JobLogger;

use super::registry::{StageId, StageRegistry};
use super::{StageError, StageResult};

/// Runs external stages against a shared registry.
#[derive(Debug, Clone)]
pub struct StageRunner {
    registry: Arc<StageRegistry>,
}

impl StageRunner {
    /// Create a runner over a resolved stage registry.
    pub fn new(registry: Arc<StageRegistry>) -> Self {
        Self { registry }
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Run one stage with positional arguments in the given working
    /// directory, appending all of its output to `logger`.
    pub fn run(
        &self,
        stage: StageId,
        args: &[String],
        cwd: &Path,
        logger: &JobLogger,
    ) -> StageResult<()> {
        let program = self.registry.resolve(stage)?;

        logger.command(&format!("{} {}", program.display(), args.join(" ")));
        tracing::debug!(stage = %stage, cwd = %cwd.display(), "running stage");

        let output = Command::new(&program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| StageError::Spawn {
                stage: stage.label().to_string(),
                source: e,
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            logger.output_line(line, false);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            logger.output_line(line, true);
        }
        logger.flush();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            logger.error(&format!("Stage '{}' exited with code {}", stage, exit_code));
            return Err(StageError::StageFailed {
                stage: stage.label().to_string(),
                exit_code,
            });
        }

        Ok(())
    }
}
