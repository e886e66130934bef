//! External processing stages.
//!
//! Every signal-processing step of the pipeline is an external executable
//! with a fixed positional-argument contract. This module resolves the
//! executables (with a one-time preflight), runs them, and parses the one
//! stage that speaks on stdout (the audio prober).

mod probe;
mod registry;
mod runner;

use std::io;

use thiserror::Error;

pub use probe::probe_recording;
pub use registry::{PreflightError, StageId, StageRegistry};
pub use runner::StageRunner;

/// Errors from invoking an external stage.
#[derive(Error, Debug)]
pub enum StageError {
    /// The stage executable could not be found.
    #[error("Stage '{stage}' is not available: {program} not found")]
    NotFound { stage: String, program: String },

    /// The stage process could not be spawned.
    #[error("Failed to spawn stage '{stage}': {source}")]
    Spawn {
        stage: String,
        #[source]
        source: io::Error,
    },

    /// The stage exited with a non-zero status.
    #[error("Stage '{stage}' failed with exit code {exit_code}")]
    StageFailed { stage: String, exit_code: i32 },

    /// The stage produced output this crate could not parse.
    #[error("Failed to parse output of stage '{stage}': {message}")]
    ParseOutput { stage: String, message: String },

    /// File I/O error around a stage invocation.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl StageError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for stage operations.
pub type StageResult<T> = Result<T, StageError>;
