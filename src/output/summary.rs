//! Run summary

use crate::state::DomainStatus;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Write-once result of a batch run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Terminal status of every domain the run finished
    pub statuses: BTreeMap<String, DomainStatus>,

    /// Domains left pending (cancellation)
    pub pending: usize,

    /// Domains skipped because a resumed checkpoint already had them terminal
    pub skipped: usize,

    pub total_records: u64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn count(&self, status: DomainStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    pub fn processed(&self) -> usize {
        self.statuses.len()
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Share of processed domains that completed, as a percentage
    pub fn success_rate(&self) -> f64 {
        match self.processed() {
            0 => 0.0,
            n => self.count(DomainStatus::Completed) as f64 / n as f64 * 100.0,
        }
    }
}
