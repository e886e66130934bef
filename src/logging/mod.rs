//! Per-job logging.
//!
//! Each job writes to its own log file so that all three stage invocations
//! of a segment pipeline land in one place for post-hoc inspection. The
//! coordinator process itself logs through `tracing`.

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LogConfig, LogLevel, MessagePrefix};
