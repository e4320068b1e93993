//! Crawler module: the per-domain pipeline and the batch around it
//!
//! - `Fetcher` / `Extractor` seams with reqwest and scraper defaults
//! - Bounded retry policy for transient errors
//! - `DomainPipeline`, the per-domain state machine
//! - `BatchScheduler`, the worker pool and checkpoint writer
//! - `run_batch`, which wires the defaults together

mod coordinator;
mod fetcher;
mod parser;
mod pipeline;
mod retry;
mod scheduler;
mod traits;

pub use coordinator::{load_status, run_batch, BatchOptions};
pub use fetcher::HttpFetcher;
pub use parser::HtmlExtractor;
pub use pipeline::{DomainPipeline, PipelineEvent, PipelineOutcome};
pub use retry::RetryPolicy;
pub use scheduler::{BacklogEntry, BatchScheduler, RunPlan};
pub use traits::{Extraction, Extractor, FetchResponse, Fetcher};
