//! Aggregate run counters

use std::path::PathBuf;

use crate::types::{OutcomeStatus, RunSummary};

/// Counters for one run
///
/// Owned by the scheduler task, which is the only place outcomes are
/// recorded, so no locking is involved.
#[derive(Debug, Clone)]
pub struct RunSession {
    case_id: String,
    total: usize,
    verified: usize,
    mismatched: usize,
    failed: usize,
    cancelled: bool,
    report_path: PathBuf,
}

impl RunSession {
    /// Start counting a run of `total` URLs
    pub fn new(case_id: impl Into<String>, total: usize, report_path: PathBuf) -> Self {
        Self {
            case_id: case_id.into(),
            total,
            verified: 0,
            mismatched: 0,
            failed: 0,
            cancelled: false,
            report_path,
        }
    }

    /// Count one terminal outcome
    pub fn record(&mut self, status: OutcomeStatus) {
        match status {
            OutcomeStatus::Verified => self.verified += 1,
            OutcomeStatus::HashMismatch => self.mismatched += 1,
            OutcomeStatus::Failed => self.failed += 1,
        }
    }

    /// Note that the run was cancelled
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Jobs that reached a terminal state
    pub fn settled(&self) -> usize {
        self.verified + self.mismatched + self.failed
    }

    /// Jobs still waiting or in flight
    pub fn outstanding(&self) -> usize {
        self.total.saturating_sub(self.settled())
    }

    /// Whether every submitted job has settled
    pub fn is_complete(&self) -> bool {
        self.settled() >= self.total
    }

    /// Overall progress in percent
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        self.settled() as f32 / self.total as f32 * 100.0
    }

    /// Snapshot of the counters
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            case_id: self.case_id.clone(),
            total: self.total,
            verified: self.verified,
            mismatched: self.mismatched,
            failed: self.failed,
            cancelled: self.cancelled,
            report_path: self.report_path.clone(),
        }
    }
}
