//! Output module for run logs, summaries and status reports
//!
//! - Markdown run log appended as domains finish
//! - The write-once `RunSummary`
//! - The `--status` report over checkpoint and security profiles

mod markdown;
pub mod stats;
mod summary;
mod traits;

pub use markdown::{format_domain_entry, format_summary, MarkdownRunLog, RunLogHeader};
pub use stats::{format_status, print_status};
pub use summary::RunSummary;
pub use traits::{DomainReport, NullRunLog, OutputError, OutputResult, RunLogSink};
