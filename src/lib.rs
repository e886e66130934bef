//! diarsplit - split-and-merge speaker diarization orchestrator.
//!
//! Drives a set of external diarization stages over one long recording:
//! the recording is split into fixed-duration segments, each segment runs
//! its own detection / change-point / clustering pipeline under a
//! concurrency limit, and the per-segment results are merged, re-scored
//! and cross-validated into one final segmentation.
//!
//! The crate does no signal processing itself; every stage is an external
//! executable resolved at startup.

pub mod aggregate;
pub mod config;
pub mod fsops;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod run;
pub mod stages;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
