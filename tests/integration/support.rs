//! Scripted collaborators for the integration tests

use async_trait::async_trait;
use nightcrawl::crawler::{DomainPipeline, FetchResponse, Fetcher, HtmlExtractor, RetryPolicy};
use nightcrawl::output::{DomainReport, OutputResult, RunLogSink, RunSummary};
use nightcrawl::quality::QualityGate;
use nightcrawl::security::{DecisionCache, FetchOutcome, Strategy};
use nightcrawl::storage::MemoryStorage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How a fake site answers
#[derive(Debug, Clone, Copy)]
pub enum Site {
    /// Text-rich pages, reachable with any strategy at or above `min_strategy`
    Open { pages: usize, min_strategy: Strategy },
    /// Markup-heavy pages with almost no text
    Thin { pages: usize },
    /// Challenges every strategy
    Blocked,
    /// Every request fails at the transport level
    Down,
    /// Pages link to a PDF which must never be fetched
    WithDownload,
    /// Like `Open`, but page `/p{limited}` answers 429 to every strategy
    RateLimitedAt { pages: usize, limited: usize },
}

impl Site {
    pub fn open(pages: usize) -> Self {
        Site::Open {
            pages,
            min_strategy: Strategy::Direct,
        }
    }
}

#[derive(Default)]
pub struct ScriptedFetcher {
    sites: HashMap<String, Site>,
    calls: Mutex<Vec<(String, Strategy)>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedFetcher {
    pub fn new(sites: &[(&str, Site)]) -> Self {
        Self {
            sites: sites.iter().map(|(h, s)| (h.to_string(), *s)).collect(),
            ..Default::default()
        }
    }

    /// Cancels `token` once `calls` fetches have been made
    pub fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    /// Every fetched URL with the strategy used, in order
    pub fn calls(&self) -> Vec<(String, Strategy)> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made for one URL
    pub fn calls_to(&self, url: &str) -> Vec<Strategy> {
        self.calls()
            .into_iter()
            .filter(|(called, _)| called == url)
            .map(|(_, strategy)| strategy)
            .collect()
    }

    pub fn calls_for(&self, host: &str) -> Vec<(String, Strategy)> {
        self.calls()
            .into_iter()
            .filter(|(url, _)| Url::parse(url).unwrap().host_str() == Some(host))
            .collect()
    }
}

fn page_index(url: &Url) -> Option<usize> {
    match url.path().trim_start_matches('/') {
        "" => Some(0),
        other => other.strip_prefix('p')?.parse().ok(),
    }
}

fn links(pages: usize) -> String {
    (1..pages)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect()
}

fn rich_page(index: usize, pages: usize) -> String {
    format!(
        "<html><head><title>Page {}</title></head><body><p>{}</p>{}</body></html>",
        index,
        "The quick brown fox jumps over the lazy dog. ".repeat(40),
        links(pages)
    )
}

fn thin_page(pages: usize) -> String {
    format!(
        "<html><body>{}<p>hi</p>{}</body></html>",
        r#"<div class="wrapper"><span></span></div>"#.repeat(200),
        links(pages)
    )
}

fn response(url: &Url, status: u16, body: String, outcome: FetchOutcome) -> FetchResponse {
    FetchResponse {
        url: url.to_string(),
        status,
        body,
        outcome,
        detail: None,
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, strategy: Strategy) -> FetchResponse {
        let made = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((url.to_string(), strategy));
            calls.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if made >= *after {
                token.cancel();
            }
        }

        let site = url.host_str().and_then(|h| self.sites.get(h)).copied();
        let not_found = || response(url, 404, "not found".to_string(), FetchOutcome::Success);

        match site {
            None => not_found(),
            Some(Site::Down) => FetchResponse {
                detail: Some("connection refused".to_string()),
                ..response(url, 0, String::new(), FetchOutcome::RetryableError)
            },
            Some(Site::Blocked) => response(
                url,
                403,
                "<title>Just a moment...</title>".to_string(),
                FetchOutcome::ChallengeDetected,
            ),
            Some(Site::Open { min_strategy, .. }) if strategy < min_strategy => response(
                url,
                403,
                "<title>Just a moment...</title>".to_string(),
                FetchOutcome::ChallengeDetected,
            ),
            Some(Site::Open { pages, .. }) => match page_index(url) {
                Some(i) if i < pages => {
                    response(url, 200, rich_page(i, pages), FetchOutcome::Success)
                }
                _ => not_found(),
            },
            Some(Site::RateLimitedAt { pages, limited }) => match page_index(url) {
                Some(i) if i == limited => response(
                    url,
                    429,
                    "slow down".to_string(),
                    FetchOutcome::RateLimited,
                ),
                Some(i) if i < pages => {
                    response(url, 200, rich_page(i, pages), FetchOutcome::Success)
                }
                _ => not_found(),
            },
            Some(Site::Thin { pages }) => match page_index(url) {
                Some(i) if i < pages => response(url, 200, thin_page(pages), FetchOutcome::Success),
                _ => not_found(),
            },
            Some(Site::WithDownload) => {
                if url.path().ends_with(".pdf") {
                    panic!("download candidate was fetched: {}", url);
                }
                match page_index(url) {
                    Some(i) if i < 2 => {
                        let body = rich_page(i, 2).replace(
                            "</body>",
                            r#"<a href="/files/report.pdf">report</a></body>"#,
                        );
                        response(url, 200, body, FetchOutcome::Success)
                    }
                    _ => not_found(),
                }
            }
        }
    }
}

/// Test knobs for a pipeline over in-memory storage
pub struct Harness {
    pub fetcher: Arc<ScriptedFetcher>,
    pub storage: Arc<MemoryStorage>,
    pub cache: Arc<DecisionCache>,
    pub sample_size: usize,
    pub max_records: u64,
}

impl Harness {
    pub fn new(fetcher: ScriptedFetcher) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self {
            fetcher: Arc::new(fetcher),
            cache: Arc::new(DecisionCache::new(storage.clone(), 5)),
            storage,
            sample_size: 3,
            max_records: 100,
        }
    }

    /// Seeds the cache with `n` outcomes as if from earlier runs
    pub fn remember(&self, domain: &str, strategy: Strategy, outcome: FetchOutcome, n: usize) {
        for _ in 0..n {
            self.cache.record(domain, strategy, outcome, None).unwrap();
        }
    }

    pub fn pipeline(&self) -> DomainPipeline {
        DomainPipeline::new(
            self.fetcher.clone(),
            Arc::new(HtmlExtractor::new()),
            self.storage.clone(),
            self.cache.clone(),
            QualityGate::new(self.sample_size, 0.15, 1.5),
            RetryPolicy::immediate(3),
            self.max_records,
            50,
        )
    }
}

/// Run log that keeps everything it is handed
#[derive(Clone, Default)]
pub struct RecordingLog {
    pub reports: Arc<Mutex<Vec<DomainReport>>>,
    pub summaries: Arc<Mutex<Vec<RunSummary>>>,
}

impl RunLogSink for RecordingLog {
    fn domain_finished(&mut self, report: &DomainReport) -> OutputResult<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    fn run_finished(&mut self, summary: &RunSummary) -> OutputResult<()> {
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}
