//! Run log sink trait and the per-domain report it receives

use crate::output::RunSummary;
use crate::quality::QualityReport;
use crate::security::Strategy;
use crate::state::DomainStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Structured record of one domain reaching a terminal status
#[derive(Debug, Clone, PartialEq)]
pub struct DomainReport {
    pub domain: String,
    pub status: DomainStatus,

    /// Strategy in use when the domain finished
    pub strategy: Option<Strategy>,

    pub records: u64,
    pub elapsed_ms: u64,

    /// Fingerprint of the last challenge seen, if any
    pub fingerprint: Option<String>,

    /// Quality gate result, if the test ran
    pub quality: Option<QualityReport>,

    /// A few fetched URLs, for reviewers
    pub sample_urls: Vec<String>,

    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Destination for per-domain terminal reports and the final summary
///
/// Only the scheduler calls it, one event at a time.
pub trait RunLogSink: Send + Sync {
    fn domain_finished(&mut self, report: &DomainReport) -> OutputResult<()>;

    fn run_finished(&mut self, summary: &RunSummary) -> OutputResult<()>;
}

/// Discards everything; used when no run log is configured
#[derive(Debug, Default)]
pub struct NullRunLog;

impl RunLogSink for NullRunLog {
    fn domain_finished(&mut self, _report: &DomainReport) -> OutputResult<()> {
        Ok(())
    }

    fn run_finished(&mut self, _summary: &RunSummary) -> OutputResult<()> {
        Ok(())
    }
}
