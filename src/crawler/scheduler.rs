//! Batch scheduler
//!
//! A fixed pool of workers takes domains from a shared backlog and drives
//! each one through the pipeline. Workers report over a channel; the
//! scheduler loop is the only writer of the checkpoint and the run log.

use crate::checkpoint::{generate_run_id, Checkpoint, CheckpointStore};
use crate::crawler::pipeline::{DomainPipeline, PipelineEvent};
use crate::output::{DomainReport, NullRunLog, RunLogSink, RunSummary};
use crate::state::{Domain, DomainStatus};
use crate::NightcrawlError;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A domain waiting for a worker, with the stage it starts at
pub type BacklogEntry = (Domain, DomainStatus);

/// What a run is going to do, settled before any worker starts
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub checkpoint: Checkpoint,
    pub backlog: Vec<BacklogEntry>,
    /// Domains already terminal in the resumed checkpoint
    pub skipped: usize,
    pub resumed: bool,
}

impl RunPlan {
    pub fn run_id(&self) -> &str {
        &self.checkpoint.run_id
    }
}

pub struct BatchScheduler {
    pipeline: Arc<DomainPipeline>,
    store: CheckpointStore,
    config_hash: String,
    run_log: Box<dyn RunLogSink>,
    cancel: CancellationToken,
    current: Arc<RwLock<Option<Checkpoint>>>,
}

impl BatchScheduler {
    pub fn new(
        pipeline: Arc<DomainPipeline>,
        store: CheckpointStore,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            store,
            config_hash: config_hash.into(),
            run_log: Box::new(NullRunLog),
            cancel: CancellationToken::new(),
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_run_log(mut self, run_log: Box<dyn RunLogSink>) -> Self {
        self.run_log = run_log;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read-only view of the checkpoint as last saved
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Builds the backlog, resuming from a valid checkpoint when asked
    ///
    /// A root listed more than once is scheduled once, with its first entry.
    pub async fn prepare(&self, domains: &[Domain], resume: bool) -> Result<RunPlan, NightcrawlError> {
        if domains.is_empty() {
            return Err(NightcrawlError::EmptyDomainList);
        }
        let mut roots = HashSet::new();
        let domains: Vec<&Domain> = domains
            .iter()
            .filter(|d| roots.insert(d.root.as_str()))
            .collect();
        let names = domains.iter().map(|d| d.root.as_str());

        let loaded = if resume { self.store.load().await } else { None };
        let (checkpoint, resumed) = match loaded {
            Some(mut checkpoint) => {
                if checkpoint.config_hash != self.config_hash {
                    warn!(
                        run_id = %checkpoint.run_id,
                        "Configuration changed since the checkpoint was written, resuming anyway"
                    );
                    checkpoint.config_hash = self.config_hash.clone();
                }
                let (added, dropped) = checkpoint.reconcile(names);
                info!(
                    run_id = %checkpoint.run_id,
                    added,
                    dropped,
                    finished = checkpoint.terminal_domains().len(),
                    "Resuming run"
                );
                (checkpoint, true)
            }
            None => {
                let run_id = generate_run_id(Utc::now());
                info!(%run_id, domains = domains.len(), "Starting fresh run");
                (Checkpoint::new(run_id, self.config_hash.as_str(), names), false)
            }
        };

        let backlog: Vec<BacklogEntry> = domains
            .iter()
            .filter(|d| !checkpoint.is_terminal(&d.root))
            .map(|d| ((*d).clone(), checkpoint.resume_stage(&d.root)))
            .collect();
        let skipped = domains.len() - backlog.len();

        Ok(RunPlan {
            checkpoint,
            backlog,
            skipped,
            resumed,
        })
    }

    /// Runs every domain to a terminal status, or until cancelled
    pub async fn run(
        &mut self,
        domains: &[Domain],
        workers: usize,
        resume: bool,
    ) -> Result<RunSummary, NightcrawlError> {
        let plan = self.prepare(domains, resume).await?;
        Ok(self.execute(plan, workers).await)
    }

    /// Executes a prepared plan with `workers` parallel workers
    pub async fn execute(&mut self, plan: RunPlan, workers: usize) -> RunSummary {
        let started_at = Utc::now();
        let RunPlan {
            mut checkpoint,
            backlog,
            skipped,
            ..
        } = plan;

        self.save(&mut checkpoint).await;

        let worker_count = workers.clamp(1, backlog.len().max(1));
        info!(
            run_id = %checkpoint.run_id,
            backlog = backlog.len(),
            skipped,
            workers = worker_count,
            "Dispatching domains"
        );

        let backlog = Arc::new(Mutex::new(VecDeque::from(backlog)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut set = JoinSet::new();
        for worker in 0..worker_count {
            set.spawn(worker_loop(
                worker,
                Arc::clone(&backlog),
                Arc::clone(&self.pipeline),
                tx.clone(),
                self.cancel.clone(),
            ));
        }
        drop(tx);

        let mut statuses = BTreeMap::new();
        let mut total_records = 0u64;

        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::StageStarted {
                    worker,
                    domain,
                    stage,
                } => {
                    checkpoint.set_in_flight(worker, &domain, stage);
                }
                PipelineEvent::Finished { worker, report } => {
                    checkpoint.clear_in_flight(worker);
                    checkpoint.move_to(&report.domain, report.status);
                    checkpoint.stats.attempted += 1;
                    if report.status == DomainStatus::Completed {
                        checkpoint.stats.succeeded += 1;
                    }
                    checkpoint.stats.records_extracted += report.records;

                    total_records += report.records;
                    statuses.insert(report.domain.clone(), report.status);
                    if let Err(e) = self.run_log.domain_finished(&report) {
                        warn!(domain = %report.domain, "Cannot append to run log: {}", e);
                    }
                }
                PipelineEvent::Interrupted {
                    worker,
                    domain,
                    resume_stage,
                } => {
                    checkpoint.clear_in_flight(worker);
                    checkpoint.move_to(&domain, DomainStatus::Pending);
                    checkpoint.resume_stages.insert(domain, resume_stage);
                }
            }
            self.save(&mut checkpoint).await;
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("Worker task ended abnormally: {}", e);
            }
        }

        checkpoint.in_flight.clear();
        self.save(&mut checkpoint).await;

        let summary = RunSummary {
            run_id: checkpoint.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            statuses,
            pending: checkpoint.count(DomainStatus::Pending),
            skipped,
            total_records,
            cancelled: self.cancel.is_cancelled(),
        };
        if let Err(e) = self.run_log.run_finished(&summary) {
            warn!("Cannot write run summary to run log: {}", e);
        }

        info!(
            run_id = %summary.run_id,
            processed = summary.processed(),
            completed = summary.count(DomainStatus::Completed),
            pending = summary.pending,
            records = summary.total_records,
            cancelled = summary.cancelled,
            "Run finished"
        );
        summary
    }

    async fn save(&self, checkpoint: &mut Checkpoint) {
        checkpoint.updated_at = Utc::now();
        if let Err(e) = self.store.save(checkpoint).await {
            warn!(path = %self.store.path().display(), "Cannot save checkpoint: {}", e);
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(checkpoint.clone());
    }
}

/// Takes domains off the backlog until it is empty or the run is cancelled
async fn worker_loop(
    worker: usize,
    backlog: Arc<Mutex<VecDeque<BacklogEntry>>>,
    pipeline: Arc<DomainPipeline>,
    events: mpsc::UnboundedSender<PipelineEvent>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let next = backlog.lock().await.pop_front();
        let Some((domain, stage)) = next else {
            break;
        };

        let root = domain.root.clone();
        let task = {
            let pipeline = Arc::clone(&pipeline);
            let events = events.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { pipeline.run(&domain, stage, worker, &events, &cancel).await })
        };

        if let Err(e) = task.await {
            error!(domain = %root, worker, "Pipeline task panicked: {}", e);
            let _ = events.send(PipelineEvent::Finished {
                worker,
                report: panicked_report(root, e.to_string()),
            });
        }
    }
}

fn panicked_report(domain: String, error: String) -> DomainReport {
    DomainReport {
        domain,
        status: DomainStatus::Failed,
        strategy: None,
        records: 0,
        elapsed_ms: 0,
        fingerprint: None,
        quality: None,
        sample_urls: Vec::new(),
        error: Some(format!("pipeline task failed: {}", error)),
        finished_at: Utc::now(),
    }
}
