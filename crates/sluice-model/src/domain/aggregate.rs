use serde::{Deserialize, Serialize};

use crate::{Job, JobOutcome};

/// A job together with the outcome it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedJob {
    pub job: Job,
    pub outcome: JobOutcome,
}

/// Coarse shape of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchSummary {
    AllPassed,
    SomePassed,
    AllFailed,
}

/// Per-batch partition of resolved jobs.
///
/// Build it through [`AggregateResult::record`] so the totals always match the lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub passed: Vec<ResolvedJob>,
    pub failed: Vec<ResolvedJob>,
    pub total_passed: usize,
    pub total_failed: usize,
}

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a resolved job into `passed` or `failed`.
    pub fn record(&mut self, resolved: ResolvedJob) {
        if resolved.outcome.is_success() {
            self.passed.push(resolved);
            self.total_passed += 1;
        } else {
            self.failed.push(resolved);
            self.total_failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.total_passed + self.total_failed
    }

    /// An empty batch counts as all-passed.
    pub fn summary(&self) -> BatchSummary {
        match (self.total_passed, self.total_failed) {
            (_, 0) => BatchSummary::AllPassed,
            (0, _) => BatchSummary::AllFailed,
            _ => BatchSummary::SomePassed,
        }
    }

    /// `"<failed> / <total> jobs failed"` when anything failed.
    pub fn error(&self) -> Option<String> {
        if self.total_failed == 0 {
            return None;
        }
        Some(format!(
            "{} / {} jobs failed",
            self.total_failed,
            self.total()
        ))
    }
}

impl FromIterator<ResolvedJob> for AggregateResult {
    fn from_iter<I: IntoIterator<Item = ResolvedJob>>(iter: I) -> Self {
        let mut result = AggregateResult::new();
        for resolved in iter {
            result.record(resolved);
        }
        result
    }
}
