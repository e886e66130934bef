//! Concrete segment pipeline steps.

mod changepoint;
mod cluster;
mod detect;

pub use changepoint::ChangePointStep;
pub use cluster::ClusterStep;
pub use detect::DetectStep;

/// Suffix of the speech/silence segmentation artifact.
pub const SPEECH_SEG_SUFFIX: &str = ".s.seg";
/// Suffix of the change-point segmentation artifact.
pub const CHANGEPOINT_SEG_SUFFIX: &str = ".bic.seg";
/// Suffix of the clustered segmentation artifact.
pub const CLUSTERED_SEG_SUFFIX: &str = ".c.seg";
/// Suffix of re-cluster refinements that must never reach aggregation.
pub const RECLUSTER_SEG_SUFFIX: &str = ".rc.c.seg";
