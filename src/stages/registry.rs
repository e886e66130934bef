//! Stage identifiers and executable resolution.
//!
//! Stages are resolved once at startup; a missing executable aborts the
//! whole run before any work happens, listing every missing stage rather
//! than just the first.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{StageError, StageResult};

/// Identifier of one external processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Split the recording into fixed-duration segment files.
    Split,
    /// Report duration and sample rate of an audio file.
    Probe,
    /// Speech/silence detection on one segment.
    Detect,
    /// Change-point (BIC) segmentation on one segment.
    ChangePoint,
    /// Speaker clustering on one segment.
    Cluster,
    /// Re-score the full recording against all per-segment models.
    Rescore,
    /// Smooth and validate boundaries of the merged segmentation.
    CrossValidate,
}

impl StageId {
    /// All stages, in pipeline order.
    pub const ALL: [StageId; 7] = [
        StageId::Split,
        StageId::Probe,
        StageId::Detect,
        StageId::ChangePoint,
        StageId::Cluster,
        StageId::Rescore,
        StageId::CrossValidate,
    ];

    /// The stage label used in errors and logging.
    pub fn label(self) -> &'static str {
        match self {
            StageId::Split => "split",
            StageId::Probe => "probe",
            StageId::Detect => "detect",
            StageId::ChangePoint => "changepoint",
            StageId::Cluster => "cluster",
            StageId::Rescore => "rescore",
            StageId::CrossValidate => "crossvalidate",
        }
    }

    /// Canonical program name of the stage executable.
    pub fn program(self) -> &'static str {
        match self {
            StageId::Split => "diar-split",
            StageId::Probe => "diar-probe",
            StageId::Detect => "diar-detect",
            StageId::ChangePoint => "diar-bicseg",
            StageId::Cluster => "diar-cluster",
            StageId::Rescore => "diar-rescore",
            StageId::CrossValidate => "diar-crossval",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One or more required stages could not be resolved.
#[derive(Error, Debug)]
#[error("Missing required stage executable(s): {}", missing.join(", "))]
pub struct PreflightError {
    /// Program names that could not be resolved.
    pub missing: Vec<String>,
}

/// Resolves stage identifiers to executable paths.
///
/// With a configured stage directory, every stage must live there under its
/// canonical program name, with the execute bit set. Without one, stages
/// are looked up on `$PATH`.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stage_dir: Option<PathBuf>,
}

impl StageRegistry {
    /// Create a registry resolving stages on `$PATH`.
    pub fn new() -> Self {
        Self { stage_dir: None }
    }

    /// Create a registry resolving stages inside one directory.
    pub fn with_stage_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            stage_dir: Some(dir.into()),
        }
    }

    /// Build a registry from the configured stage directory, if any.
    pub fn from_stage_dir_setting(stage_dir: &str) -> Self {
        if stage_dir.is_empty() {
            Self::new()
        } else {
            Self::with_stage_dir(stage_dir)
        }
    }

    /// Resolve a stage to its executable path.
    pub fn resolve(&self, stage: StageId) -> StageResult<PathBuf> {
        self.lookup(stage).ok_or_else(|| StageError::NotFound {
            stage: stage.label().to_string(),
            program: stage.program().to_string(),
        })
    }

    fn lookup(&self, stage: StageId) -> Option<PathBuf> {
        match &self.stage_dir {
            Some(dir) => {
                let candidate = dir.join(stage.program());
                is_executable(&candidate).then_some(candidate)
            }
            None => search_path(stage.program()),
        }
    }

    /// Verify that every required stage is resolvable.
    ///
    /// The change-point stage is only required when enabled for the run.
    /// Fails with the complete list of missing programs.
    pub fn preflight(&self, use_changepoint: bool) -> Result<(), PreflightError> {
        let mut missing = Vec::new();

        for stage in StageId::ALL {
            if stage == StageId::ChangePoint && !use_changepoint {
                continue;
            }
            if self.lookup(stage).is_none() {
                missing.push(stage.program().to_string());
            }
        }

        if missing.is_empty() {
            tracing::debug!("Preflight passed, all stage executables resolved");
            Ok(())
        } else {
            Err(PreflightError { missing })
        }
    }
}

/// Look up a program on `$PATH`.
fn search_path(program: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.is_file()
        && std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
