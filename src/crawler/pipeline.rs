//! Domain pipeline
//!
//! Drives one domain through `AssessingSecurity -> QualityTesting ->
//! FullScraping` to a terminal status. The sample and the full scrape share a
//! single breadth-first walk from the seed URL, so pages fetched for the
//! quality test are not fetched again.

use crate::crawler::retry::RetryPolicy;
use crate::crawler::traits::{Extractor, FetchResponse, Fetcher};
use crate::output::DomainReport;
use crate::quality::{QualityGate, QualityReport, Sample};
use crate::security::{challenge_fingerprint, DecisionCache, Escalation, FetchOutcome, Strategy};
use crate::state::{Domain, DomainProgress, DomainStatus};
use crate::storage::{DownloadCandidate, ExtractedRecord, RecordSink};
use crate::url::{classify, normalize_url, Scope};
use crate::DomainError;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Progress notifications sent to the scheduler
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StageStarted {
        worker: usize,
        domain: String,
        stage: DomainStatus,
    },
    Finished {
        worker: usize,
        report: DomainReport,
    },
    /// Cancelled between stages; `resume_stage` is the next one to run
    Interrupted {
        worker: usize,
        domain: String,
        resume_stage: DomainStatus,
    },
}

/// How a pipeline run ended
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Finished(DomainReport),
    Interrupted { resume_stage: DomainStatus },
}

/// Result of fetching one URL through strategy selection and retries
enum PageFetch {
    Fetched {
        response: FetchResponse,
        strategy: Strategy,
    },
    /// A failure signature at the last strategy; `exhausted` when no
    /// strategy has ever got through
    Blocked { exhausted: bool },
    RetriesExhausted {
        attempts: u32,
    },
}

enum StageOutcome {
    Advance,
    Finish(DomainStatus),
}

/// Frontier of in-scope pages not yet fetched
#[derive(Debug)]
struct Walk {
    frontier: VecDeque<Url>,
    seen: HashSet<String>,
    fetched: u32,
    max_pages: u32,
}

impl Walk {
    fn new(seed: Url, max_pages: u32) -> Self {
        let mut walk = Self {
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            fetched: 0,
            max_pages,
        };
        walk.admit(seed);
        walk
    }

    /// Queues `url` unless it was seen before
    fn admit(&mut self, url: Url) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.frontier.push_back(url);
        true
    }

    /// Marks a URL seen without queueing it
    fn mark_seen(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    fn next(&mut self) -> Option<Url> {
        if self.fetched >= self.max_pages {
            return None;
        }
        let url = self.frontier.pop_front()?;
        self.fetched += 1;
        Some(url)
    }
}

/// Everything one run of the pipeline accumulates for its domain
struct DomainJob<'a> {
    domain: &'a Domain,
    progress: DomainProgress,
    walk: Walk,
    /// Seed response from the assessment, reused as the first walk page
    probe: Option<(Url, FetchResponse, Strategy)>,
    samples: Vec<Sample>,
    sample_urls: Vec<String>,
    quality: Option<QualityReport>,
    fingerprint: Option<String>,
    strategy: Option<Strategy>,
}

/// Outcome of processing one walk page
enum PageStep {
    /// Page produced a sample (and maybe a record)
    Extracted(Sample),
    /// Page skipped (non-2xx status, retries exhausted, or blocked on a
    /// domain that has been fetched before)
    Skipped,
    /// Every strategy is blocked and none ever succeeded
    Blocked,
}

pub struct DomainPipeline {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn RecordSink>,
    cache: Arc<DecisionCache>,
    gate: QualityGate,
    retry: RetryPolicy,
    max_records: u64,
    max_pages: u32,
}

impl DomainPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn RecordSink>,
        cache: Arc<DecisionCache>,
        gate: QualityGate,
        retry: RetryPolicy,
        max_records: u64,
        max_pages: u32,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            sink,
            cache,
            gate,
            retry,
            max_records,
            max_pages,
        }
    }

    /// Runs `domain` from `start_stage` until it is terminal or cancelled
    ///
    /// Cancellation is checked between stages only; a stage that has begun
    /// runs to its end.
    pub async fn run(
        &self,
        domain: &Domain,
        start_stage: DomainStatus,
        worker: usize,
        events: &UnboundedSender<PipelineEvent>,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let start_stage = if start_stage.is_active() {
            start_stage
        } else {
            DomainStatus::AssessingSecurity
        };

        let seed = match domain.seed_url().and_then(|u| normalize_url(u.as_str())) {
            Ok(seed) => seed,
            Err(e) => {
                let mut progress = DomainProgress::new(&domain.root);
                progress.set_error(format!("invalid seed URL: {}", e));
                let _ = progress.transition(DomainStatus::Failed);
                return self.finish(domain, progress, worker, events);
            }
        };

        let mut job = DomainJob {
            domain,
            progress: DomainProgress::new(&domain.root),
            walk: Walk::new(seed, self.max_pages),
            probe: None,
            samples: Vec::new(),
            sample_urls: Vec::new(),
            quality: None,
            fingerprint: None,
            strategy: None,
        };

        let mut stage = start_stage;
        loop {
            if cancel.is_cancelled() {
                info!(domain = %domain.root, resume = %stage, "Domain interrupted");
                let outcome = PipelineOutcome::Interrupted { resume_stage: stage };
                let _ = events.send(PipelineEvent::Interrupted {
                    worker,
                    domain: domain.root.clone(),
                    resume_stage: stage,
                });
                return outcome;
            }

            if let Err(e) = job.progress.transition(stage) {
                return self.fail(job, DomainError::from(e), worker, events);
            }
            info!(domain = %domain.root, %stage, "Stage started");
            let _ = events.send(PipelineEvent::StageStarted {
                worker,
                domain: domain.root.clone(),
                stage,
            });

            let result = match stage {
                DomainStatus::AssessingSecurity => self.assess(&mut job).await,
                DomainStatus::QualityTesting => self.quality_test(&mut job).await,
                _ => self.full_scrape(&mut job).await,
            };

            match result {
                Ok(StageOutcome::Advance) => match stage.next_stage() {
                    Some(next) if next.is_active() => stage = next,
                    _ => return self.conclude(job, worker, events),
                },
                Ok(StageOutcome::Finish(status)) => {
                    if let Err(e) = job.progress.transition(status) {
                        return self.fail(job, DomainError::from(e), worker, events);
                    }
                    return self.report(job, worker, events);
                }
                Err(e) => return self.fail(job, e, worker, events),
            }
        }
    }

    /// Probes the seed URL until a strategy gets through
    async fn assess(&self, job: &mut DomainJob<'_>) -> Result<StageOutcome, DomainError> {
        let Some(seed) = job.walk.frontier.front().cloned() else {
            return Ok(StageOutcome::Advance);
        };

        match self.fetch_page(job, &seed).await? {
            PageFetch::Fetched { response, strategy } => {
                info!(
                    domain = %job.domain.root,
                    %strategy,
                    status = response.status,
                    "Security assessment passed"
                );
                job.probe = Some((seed, response, strategy));
                Ok(StageOutcome::Advance)
            }
            PageFetch::Blocked { exhausted: true } => Ok(self.blocked(job)),
            PageFetch::Blocked { exhausted: false } => {
                warn!(
                    domain = %job.domain.root,
                    "Seed blocked at every strategy, continuing on earlier successes"
                );
                Ok(StageOutcome::Advance)
            }
            PageFetch::RetriesExhausted { attempts } => Err(DomainError::RetriesExhausted {
                url: seed.to_string(),
                attempts,
            }),
        }
    }

    /// Collects the quality sample and judges it
    async fn quality_test(&self, job: &mut DomainJob<'_>) -> Result<StageOutcome, DomainError> {
        let target = self.gate.sample_size();

        while job.samples.len() < target {
            let Some(url) = job.walk.next() else {
                break;
            };
            match self.process_page(job, url, DomainStatus::QualityTesting).await? {
                PageStep::Extracted(sample) => job.samples.push(sample),
                PageStep::Skipped => {}
                PageStep::Blocked => return Ok(self.blocked(job)),
            }
        }

        let report = self.gate.evaluate(&job.samples);
        job.quality = Some(report);
        info!(
            domain = %job.domain.root,
            ratio = report.ratio,
            threshold = report.threshold,
            samples = report.samples,
            low_confidence = report.low_confidence,
            "Quality test {}",
            if report.passed() { "passed" } else { "failed" }
        );

        if report.passed() {
            Ok(StageOutcome::Advance)
        } else {
            job.progress.set_error(
                DomainError::QualityBelowThreshold {
                    ratio: report.ratio,
                    threshold: report.threshold,
                }
                .to_string(),
            );
            Ok(StageOutcome::Finish(DomainStatus::MarkedForReview))
        }
    }

    /// Continues the walk up to the record cap
    async fn full_scrape(&self, job: &mut DomainJob<'_>) -> Result<StageOutcome, DomainError> {
        while job.progress.records < self.max_records {
            let Some(url) = job.walk.next() else {
                break;
            };
            if let PageStep::Blocked = self.process_page(job, url, DomainStatus::FullScraping).await? {
                return Ok(self.blocked(job));
            }
        }
        Ok(StageOutcome::Advance)
    }

    fn blocked(&self, job: &mut DomainJob<'_>) -> StageOutcome {
        job.progress.set_error(
            DomainError::NoViableStrategy {
                domain: job.domain.root.clone(),
            }
            .to_string(),
        );
        StageOutcome::Finish(DomainStatus::ManualReview)
    }

    /// Fetches, extracts and persists one walk page, queueing its links
    async fn process_page(
        &self,
        job: &mut DomainJob<'_>,
        url: Url,
        stage: DomainStatus,
    ) -> Result<PageStep, DomainError> {
        let probed = match job.probe.take() {
            Some((probe_url, response, strategy)) if probe_url == url => Some((response, strategy)),
            other => {
                job.probe = other;
                None
            }
        };

        let (response, strategy) = match probed {
            Some(fetched) => fetched,
            None => match self.fetch_page(job, &url).await? {
                PageFetch::Fetched { response, strategy } => (response, strategy),
                PageFetch::Blocked { exhausted: true } => return Ok(PageStep::Blocked),
                PageFetch::Blocked { exhausted: false } => {
                    warn!(domain = %job.domain.root, %url, "Skipping page blocked at every strategy");
                    return Ok(PageStep::Skipped);
                }
                PageFetch::RetriesExhausted { attempts } => {
                    warn!(domain = %job.domain.root, %url, attempts, "Skipping page after retries");
                    return Ok(PageStep::Skipped);
                }
            },
        };

        if !response.is_success_status() {
            debug!(domain = %job.domain.root, %url, status = response.status, "Skipping non-2xx page");
            return Ok(PageStep::Skipped);
        }

        let base = Url::parse(&response.url).unwrap_or_else(|_| url.clone());
        let extraction = self.extractor.extract(&response.body, &base);
        let sample = Sample {
            text_len: extraction.text.len(),
            raw_len: response.body.len(),
        };

        if stage == DomainStatus::QualityTesting {
            job.sample_urls.push(url.to_string());
        }

        if extraction.record_count > 0 {
            self.sink.append_record(&ExtractedRecord {
                domain: job.domain.root.clone(),
                url: url.to_string(),
                strategy,
                stage,
                title: extraction.title.clone(),
                text: extraction.text.clone(),
                raw_length: response.body.len(),
                extracted_at: Utc::now(),
            })?;
            job.progress.records += extraction.record_count as u64;
        }

        let page_in_scope = classify(job.domain, &response.url, false).scope == Scope::InScope
            || classify(job.domain, url.as_str(), false).scope == Scope::InScope;
        self.follow_links(job, &extraction.links, url.as_str(), page_in_scope)?;

        Ok(PageStep::Extracted(sample))
    }

    fn follow_links(
        &self,
        job: &mut DomainJob<'_>,
        links: &[String],
        referrer: &str,
        referrer_in_scope: bool,
    ) -> Result<(), DomainError> {
        for link in links {
            let classification = classify(job.domain, link, referrer_in_scope);
            if !classification.is_crawlable() && !classification.is_download() {
                continue;
            }
            let Ok(normalized) = normalize_url(link) else {
                continue;
            };

            if classification.is_download() {
                if job.walk.mark_seen(normalized.as_str()) {
                    self.sink.append_download(&DownloadCandidate {
                        domain: job.domain.root.clone(),
                        url: normalized.to_string(),
                        referrer: referrer.to_string(),
                        discovered_at: Utc::now(),
                    })?;
                }
            } else {
                job.walk.admit(normalized);
            }
        }
        Ok(())
    }

    /// Fetches `url` with the decided strategy, escalating on failure
    /// signatures and retrying transient errors at the same strategy
    ///
    /// Each failure signature moves this page to a strictly more capable
    /// strategy, so the loop ends after at most one pass up the ladder. A
    /// rate limit at the top strategy is retried with backoff.
    async fn fetch_page(&self, job: &mut DomainJob<'_>, url: &Url) -> Result<PageFetch, DomainError> {
        let domain: &Domain = job.domain;
        let root = domain.root.as_str();
        let mut strategy = self.cache.decide(root)?;
        let mut attempt = 0u32;

        loop {
            job.strategy = Some(strategy);
            attempt += 1;
            job.progress.record_attempt();

            let response = self.fetcher.fetch(url, strategy).await;
            let outcome = response.outcome;

            match outcome {
                FetchOutcome::Success => {
                    self.cache.record(root, strategy, outcome, None)?;
                    return Ok(PageFetch::Fetched { response, strategy });
                }
                FetchOutcome::RetryableError => {
                    self.cache.record(root, strategy, outcome, response.detail.clone())?;
                    if !self.retry.should_retry(attempt) {
                        job.progress.set_error(format!(
                            "{}: {}",
                            url,
                            response.detail.as_deref().unwrap_or("transient error")
                        ));
                        return Ok(PageFetch::RetriesExhausted { attempts: attempt });
                    }
                    let delay = self.retry.backoff(attempt);
                    debug!(domain = root, %url, attempt, ?delay, "Retrying after transient error");
                    tokio::time::sleep(delay).await;
                }
                _ => {
                    let fingerprint = challenge_fingerprint(response.status, &response.body);
                    let note = format!(
                        "{} {} at {} on {} (status {}{}) fingerprint {}",
                        Utc::now().to_rfc3339(),
                        outcome,
                        strategy,
                        url,
                        response.status,
                        response
                            .detail
                            .as_deref()
                            .map(|d| format!(", {}", d))
                            .unwrap_or_default(),
                        fingerprint
                    );
                    job.fingerprint = Some(fingerprint);

                    let escalation = self.cache.record(root, strategy, outcome, Some(note))?;
                    match strategy.escalate() {
                        Some(next) => {
                            strategy = next.max(self.cache.decide(root)?);
                            attempt = 0;
                        }
                        None if matches!(outcome, FetchOutcome::RateLimited)
                            && self.retry.should_retry(attempt) =>
                        {
                            let delay = self.retry.backoff(attempt);
                            debug!(domain = root, %url, attempt, ?delay, "Backing off after rate limit");
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Ok(PageFetch::Blocked {
                                exhausted: matches!(escalation, Escalation::Exhausted),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Terminal status once every stage has run
    fn conclude(
        &self,
        mut job: DomainJob<'_>,
        worker: usize,
        events: &UnboundedSender<PipelineEvent>,
    ) -> PipelineOutcome {
        let status = if job.progress.records > 0 {
            DomainStatus::Completed
        } else {
            job.progress.set_error("no records extracted");
            DomainStatus::MarkedForReview
        };
        if let Err(e) = job.progress.transition(status) {
            return self.fail(job, DomainError::from(e), worker, events);
        }
        self.report(job, worker, events)
    }

    fn fail(
        &self,
        mut job: DomainJob<'_>,
        error: DomainError,
        worker: usize,
        events: &UnboundedSender<PipelineEvent>,
    ) -> PipelineOutcome {
        warn!(domain = %job.domain.root, error = %error, "Domain failed");
        job.progress.set_error(error.to_string());
        if !job.progress.status.is_terminal() {
            let _ = job.progress.transition(DomainStatus::Failed);
        }
        self.report(job, worker, events)
    }

    fn report(
        &self,
        job: DomainJob<'_>,
        worker: usize,
        events: &UnboundedSender<PipelineEvent>,
    ) -> PipelineOutcome {
        let DomainJob {
            domain,
            progress,
            sample_urls,
            quality,
            fingerprint,
            strategy,
            ..
        } = job;
        self.emit(build_report(progress, strategy, fingerprint, quality, sample_urls), domain, worker, events)
    }

    fn finish(
        &self,
        domain: &Domain,
        progress: DomainProgress,
        worker: usize,
        events: &UnboundedSender<PipelineEvent>,
    ) -> PipelineOutcome {
        self.emit(build_report(progress, None, None, None, Vec::new()), domain, worker, events)
    }

    fn emit(
        &self,
        report: DomainReport,
        domain: &Domain,
        worker: usize,
        events: &UnboundedSender<PipelineEvent>,
    ) -> PipelineOutcome {
        info!(
            domain = %domain.root,
            status = %report.status,
            strategy = ?report.strategy,
            records = report.records,
            elapsed_ms = report.elapsed_ms,
            fingerprint = ?report.fingerprint,
            "Domain finished"
        );
        let _ = events.send(PipelineEvent::Finished {
            worker,
            report: report.clone(),
        });
        PipelineOutcome::Finished(report)
    }
}

fn build_report(
    progress: DomainProgress,
    strategy: Option<Strategy>,
    fingerprint: Option<String>,
    quality: Option<QualityReport>,
    sample_urls: Vec<String>,
) -> DomainReport {
    DomainReport {
        elapsed_ms: progress.elapsed().num_milliseconds().max(0) as u64,
        finished_at: progress.finished_at.unwrap_or_else(Utc::now),
        domain: progress.domain,
        status: progress.status,
        strategy,
        records: progress.records,
        fingerprint,
        quality,
        sample_urls,
        error: progress.last_error,
    }
}
