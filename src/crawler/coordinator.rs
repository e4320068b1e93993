//! Run coordination
//!
//! Wires the default collaborators (SQLite storage, reqwest fetcher, scraper
//! extractor, markdown run log, file checkpoint) into a `BatchScheduler` and
//! records the run in the `runs` table.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::Config;
use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::parser::HtmlExtractor;
use crate::crawler::pipeline::DomainPipeline;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::BatchScheduler;
use crate::output::{MarkdownRunLog, RunLogHeader, RunSummary};
use crate::quality::QualityGate;
use crate::security::{DecisionCache, SecurityProfile};
use crate::state::Domain;
use crate::storage::{open_storage, ProfileStore, RunStatus};
use crate::NightcrawlError;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-invocation switches from the command line
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub resume: bool,
    /// Overrides `orchestrator.workers`
    pub workers: Option<u32>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            resume: true,
            workers: None,
        }
    }
}

fn checkpoint_store(config: &Config) -> CheckpointStore {
    CheckpointStore::new(&config.checkpoint.path, config.checkpoint.staleness_hours)
}

/// Runs one batch over `domains` with the default collaborators
pub async fn run_batch(
    config: &Config,
    config_hash: &str,
    domains: &[Domain],
    options: BatchOptions,
    cancel: CancellationToken,
) -> Result<RunSummary, NightcrawlError> {
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let cache = Arc::new(DecisionCache::new(
        storage.clone(),
        config.security.min_confidence,
    ));

    let pipeline = DomainPipeline::new(
        Arc::new(HttpFetcher::new(&config.fetcher)?),
        Arc::new(HtmlExtractor::new()),
        storage.clone(),
        cache,
        QualityGate::from_config(&config.quality),
        RetryPolicy::from_config(&config.retry),
        config.orchestrator.max_records,
        config.orchestrator.max_pages,
    );

    let scheduler =
        BatchScheduler::new(Arc::new(pipeline), checkpoint_store(config), config_hash)
            .with_cancellation(cancel);
    let plan = scheduler.prepare(domains, options.resume).await?;
    let workers = options.workers.unwrap_or(config.orchestrator.workers);

    let run_log = MarkdownRunLog::open(
        Path::new(&config.output.run_log_dir),
        &RunLogHeader {
            run_id: plan.run_id().to_string(),
            total_domains: plan.backlog.len(),
            workers,
            max_records: config.orchestrator.max_records,
        },
    )?;
    tracing::info!("Run log: {}", run_log.path().display());
    let mut scheduler = scheduler.with_run_log(Box::new(run_log));

    storage.begin_run(plan.run_id(), config_hash)?;
    let summary = scheduler.execute(plan, workers as usize).await;

    let status = if summary.cancelled {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    storage.finish_run(&summary.run_id, status)?;

    Ok(summary)
}

/// Current checkpoint (if resumable) and every stored security profile
pub async fn load_status(
    config: &Config,
) -> Result<(Option<Checkpoint>, Vec<SecurityProfile>), NightcrawlError> {
    let checkpoint = checkpoint_store(config).load().await;
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let profiles = storage.list_profiles()?;
    Ok((checkpoint, profiles))
}
