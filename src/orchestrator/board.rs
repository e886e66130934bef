//! In-process job status board.
//!
//! Replaces the marker-file coordination of the shell ancestor with a
//! shared map: the scheduler can ask "how many jobs are running right now"
//! and workers publish their own transitions. All transitions happen under
//! one lock, so an observer never sees a job that is neither running nor
//! terminal, nor one that is both.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Lifecycle of one segment job. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    /// Registered, not yet picked up by its worker.
    Pending,
    /// Worker is executing the segment pipeline.
    Running,
    /// Pipeline completed; clustered artifact exists.
    Done,
    /// Pipeline failed; the job contributes nothing to aggregation.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Aggregate counts across the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCounts {
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
}

/// Shared status map, one entry per job keyed by segment base name.
#[derive(Debug, Clone, Default)]
pub struct JobBoard {
    inner: Arc<Mutex<HashMap<String, JobStatus>>>,
}

impl JobBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job as pending.
    pub fn register(&self, job: &str) {
        self.inner.lock().insert(job.to_string(), JobStatus::Pending);
    }

    /// Mark a job running.
    pub fn mark_running(&self, job: &str) {
        self.inner.lock().insert(job.to_string(), JobStatus::Running);
    }

    /// Transition a job to done.
    ///
    /// The swap happens under the lock: no observer can see the job
    /// without a status, or with both a running and a terminal status.
    pub fn mark_done(&self, job: &str) {
        self.transition(job, JobStatus::Done);
    }

    /// Transition a job to failed.
    pub fn mark_failed(&self, job: &str) {
        self.transition(job, JobStatus::Failed);
    }

    fn transition(&self, job: &str, status: JobStatus) {
        let mut map = self.inner.lock();
        let entry = map.entry(job.to_string()).or_insert(JobStatus::Pending);
        debug_assert!(
            !entry.is_terminal(),
            "job '{job}' already terminal ({entry:?})"
        );
        *entry = status;
    }

    /// Get one job's current status.
    pub fn status(&self, job: &str) -> Option<JobStatus> {
        self.inner.lock().get(job).copied()
    }

    /// Number of jobs currently running.
    pub fn running_count(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|s| **s == JobStatus::Running)
            .count()
    }

    /// Counts per status.
    pub fn counts(&self) -> BoardCounts {
        let map = self.inner.lock();
        let mut counts = BoardCounts::default();
        for status in map.values() {
            match status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Whether every registered job has reached a terminal state.
    pub fn all_terminal(&self) -> bool {
        self.inner.lock().values().all(|s| s.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let board = JobBoard::new();
        board.register("seg_001");
        assert_eq!(board.status("seg_001"), Some(JobStatus::Pending));
        assert_eq!(board.running_count(), 0);

        board.mark_running("seg_001");
        assert_eq!(board.running_count(), 1);
        assert!(!board.all_terminal());

        board.mark_done("seg_001");
        assert_eq!(board.status("seg_001"), Some(JobStatus::Done));
        assert_eq!(board.running_count(), 0);
        assert!(board.all_terminal());
    }

    #[test]
    fn counts_track_all_states() {
        let board = JobBoard::new();
        for name in ["a", "b", "c", "d"] {
            board.register(name);
        }
        board.mark_running("a");
        board.mark_running("b");
        board.mark_done("a");
        board.mark_running("c");
        board.mark_failed("c");

        let counts = board.counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.running, 1);
        assert_eq!(counts.done, 1);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn terminal_is_done_xor_failed() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
