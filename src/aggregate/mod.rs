//! Result aggregation across segment jobs.
//!
//! After the per-segment jobs finish, the clustered segmentations of every
//! successful job are gathered into manifests and fed through the two
//! recording-level stages: rescoring (which merges and re-scores the
//! per-segment results against the speech segmentation) and
//! cross-validation (which produces the final segmentation). Failed jobs
//! simply contribute nothing; the aggregate covers whatever completed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::logging::JobLogger;
use crate::models::base_name_of;
use crate::orchestrator::steps::{CLUSTERED_SEG_SUFFIX, RECLUSTER_SEG_SUFFIX, SPEECH_SEG_SUFFIX};
use crate::stages::{StageError, StageId, StageRunner};

/// Suffix of the merged segmentation the rescorer produces.
pub const MERGED_SEG_SUFFIX: &str = ".merged.seg";
/// Suffix of the final segmentation the cross-validator produces.
pub const FINAL_SEG_SUFFIX: &str = ".final.seg";

/// Errors from the aggregation phase.
#[derive(Error, Debug)]
pub enum AggregateError {
    /// No segment job produced a clustered segmentation.
    #[error("no segment job completed; nothing to aggregate")]
    NoCompletedJobs,

    /// An aggregation stage reported success but its artifact is missing.
    #[error("expected artifact missing after '{stage}': {path}")]
    MissingArtifact { stage: String, path: PathBuf },

    /// An aggregation stage failed.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl AggregateError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for aggregation operations.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Segmentation artifacts collected from the job tree.
#[derive(Debug, Default)]
pub struct CollectedArtifacts {
    /// Clustered segmentations, sorted by path. Re-cluster refinements
    /// are excluded.
    pub clustered: Vec<PathBuf>,
    /// Speech/silence segmentations, sorted by path.
    pub speech: Vec<PathBuf>,
}

/// Outputs of a completed aggregation.
#[derive(Debug, Clone)]
pub struct AggregateOutput {
    /// The merged segmentation from the rescoring stage.
    pub merged_seg: PathBuf,
    /// The final segmentation from the cross-validation stage.
    pub final_seg: PathBuf,
    /// How many clustered segmentations went into the merge.
    pub clustered_count: usize,
}

/// Runs the recording-level aggregation stages.
pub struct Aggregator {
    runner: StageRunner,
    /// Run root where manifests and recording-level artifacts live.
    work_root: PathBuf,
    /// The recording being aggregated.
    recording: PathBuf,
    recording_base: String,
}

impl Aggregator {
    pub fn new(runner: StageRunner, work_root: impl Into<PathBuf>, recording: &Path) -> Self {
        Self {
            runner,
            work_root: work_root.into(),
            recording: recording.to_path_buf(),
            recording_base: base_name_of(recording),
        }
    }

    /// Path of a recording-level artifact at the run root.
    fn run_artifact(&self, suffix: &str) -> PathBuf {
        self.work_root
            .join(format!("{}{}", self.recording_base, suffix))
    }

    /// Aggregate the collected artifacts into the final segmentation.
    ///
    /// Writes the clustered and speech manifests at the run root, then runs
    /// rescoring followed by cross-validation, verifying each stage's
    /// artifact before moving on.
    pub fn run(
        &self,
        artifacts: &CollectedArtifacts,
        logger: &JobLogger,
    ) -> AggregateResult<AggregateOutput> {
        if artifacts.clustered.is_empty() {
            return Err(AggregateError::NoCompletedJobs);
        }

        logger.section("Aggregation");
        logger.info(&format!(
            "Aggregating {} clustered segmentations",
            artifacts.clustered.len()
        ));

        let clustered_manifest = self.run_artifact(".clustered.scp");
        let speech_manifest = self.run_artifact(".speech.scp");
        write_manifest(&clustered_manifest, &artifacts.clustered)?;
        write_manifest(&speech_manifest, &artifacts.speech)?;

        // Rescore: merge the per-segment clusterings and re-score them
        // against the speech segmentation.
        let merged_seg = self.run_artifact(MERGED_SEG_SUFFIX);
        let args = vec![
            self.recording.display().to_string(),
            clustered_manifest.display().to_string(),
            speech_manifest.display().to_string(),
            self.work_root.display().to_string(),
        ];
        self.runner
            .run(StageId::Rescore, &args, &self.work_root, logger)?;
        require_artifact(StageId::Rescore, &merged_seg)?;

        // Cross-validate the merged segmentation into the final one.
        let final_seg = self.run_artifact(FINAL_SEG_SUFFIX);
        let args = vec![
            self.recording.display().to_string(),
            merged_seg.display().to_string(),
            speech_manifest.display().to_string(),
            self.work_root.display().to_string(),
        ];
        self.runner
            .run(StageId::CrossValidate, &args, &self.work_root, logger)?;
        require_artifact(StageId::CrossValidate, &final_seg)?;

        logger.success(&format!(
            "Final segmentation ready: {}",
            final_seg.display()
        ));

        Ok(AggregateOutput {
            merged_seg,
            final_seg,
            clustered_count: artifacts.clustered.len(),
        })
    }
}

fn require_artifact(stage: StageId, path: &Path) -> AggregateResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(AggregateError::MissingArtifact {
            stage: stage.label().to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Walk the job tree and collect the segmentation artifacts.
///
/// Clustered artifacts ending in the re-cluster suffix are skipped: they
/// are internal refinements of the clusterer and must not be merged again.
/// Speech segmentations with no valid interval record are skipped with a
/// warning, so a recordless (all-silence or malformed) detection output
/// never reaches the rescoring and cross-validation stages. An empty
/// clustered set is handled by the caller as `NoCompletedJobs`.
pub fn collect_artifacts(jobs_root: &Path) -> AggregateResult<CollectedArtifacts> {
    let mut artifacts = CollectedArtifacts::default();
    walk(jobs_root, &mut artifacts)?;
    artifacts.clustered.sort();
    artifacts.speech.sort();
    Ok(artifacts)
}

fn walk(dir: &Path, artifacts: &mut CollectedArtifacts) -> AggregateResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AggregateError::io(format!("reading directory {}", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| AggregateError::io(format!("reading entry in {}", dir.display()), e))?;
        let path = entry.path();

        if path.is_dir() {
            walk(&path, artifacts)?;
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        // Every re-cluster name also ends with the clustered suffix, so
        // the exclusion check comes first.
        if name.ends_with(RECLUSTER_SEG_SUFFIX) {
            continue;
        }
        if name.ends_with(CLUSTERED_SEG_SUFFIX) {
            artifacts.clustered.push(path);
        } else if name.ends_with(SPEECH_SEG_SUFFIX) {
            if count_interval_records(&path)? == 0 {
                tracing::warn!(
                    "skipping {}: no interval records",
                    path.display()
                );
                continue;
            }
            artifacts.speech.push(path);
        }
    }
    Ok(())
}

/// Number of valid interval records in a segmentation file.
fn count_interval_records(path: &Path) -> AggregateResult<usize> {
    let content = fs::read_to_string(path)
        .map_err(|e| AggregateError::io(format!("reading {}", path.display()), e))?;
    Ok(content.lines().filter(|l| is_interval_record(l)).count())
}

/// Whether a segmentation line is a usable interval record.
///
/// Two forms are accepted: two leading numeric tokens (`start end ...`)
/// and the compact single token form (`start-end`). In both, the start
/// must be strictly before the end. Blank lines and `#` comments are not
/// records.
pub fn is_interval_record(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return false;
    }

    let mut tokens = line.split_whitespace();
    let first = match tokens.next() {
        Some(t) => t,
        None => return false,
    };

    if let Some(second) = tokens.next() {
        if let (Ok(start), Ok(end)) = (first.parse::<f64>(), second.parse::<f64>()) {
            return start < end;
        }
    }

    // Compact form: "12.5-30.0".
    if let Some((a, b)) = first.split_once('-') {
        if let (Ok(start), Ok(end)) = (a.parse::<f64>(), b.parse::<f64>()) {
            return start < end;
        }
    }
    false
}

/// Write a manifest listing one artifact path per line.
fn write_manifest(path: &Path, entries: &[PathBuf]) -> AggregateResult<()> {
    let mut file = fs::File::create(path)
        .map_err(|e| AggregateError::io(format!("creating manifest {}", path.display()), e))?;
    for entry in entries {
        writeln!(file, "{}", entry.display())
            .map_err(|e| AggregateError::io(format!("writing manifest {}", path.display()), e))?;
    }
    Ok(())
}

/// Copy the final segmentation to the requested output path, creating
/// parent directories as needed.
pub fn deliver_final(final_seg: &Path, output: &Path) -> AggregateResult<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AggregateError::io(format!("creating output directory {}", parent.display()), e)
            })?;
        }
    }
    fs::copy(final_seg, output).map_err(|e| {
        AggregateError::io(
            format!(
                "copying {} to {}",
                final_seg.display(),
                output.display()
            ),
            e,
        )
    })?;
    Ok(())
}
