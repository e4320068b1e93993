//! Single-domain pipeline behavior against scripted sites

use crate::support::{Harness, ScriptedFetcher, Site};
use nightcrawl::crawler::{PipelineEvent, PipelineOutcome};
use nightcrawl::output::DomainReport;
use nightcrawl::security::{FetchOutcome, Strategy};
use nightcrawl::state::{Domain, DomainStatus};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn run_domain(
    harness: &Harness,
    root: &str,
    start: DomainStatus,
) -> (PipelineOutcome, Vec<PipelineEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = harness
        .pipeline()
        .run(&Domain::new(root), start, 0, &tx, &CancellationToken::new())
        .await;
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (outcome, events)
}

async fn finish(harness: &Harness, root: &str) -> DomainReport {
    match run_domain(harness, root, DomainStatus::AssessingSecurity).await.0 {
        PipelineOutcome::Finished(report) => report,
        other => panic!("expected a finished domain, got {:?}", other),
    }
}

#[tokio::test]
async fn test_open_site_completes_through_every_stage() {
    let harness = Harness::new(ScriptedFetcher::new(&[("a.test", Site::open(6))]));
    let (outcome, events) = run_domain(&harness, "a.test", DomainStatus::AssessingSecurity).await;

    let PipelineOutcome::Finished(report) = outcome else {
        panic!("pipeline was interrupted");
    };
    assert_eq!(report.status, DomainStatus::Completed);
    assert_eq!(report.strategy, Some(Strategy::Direct));
    assert_eq!(report.records, 6);
    assert!(report.quality.unwrap().passed());
    assert_eq!(report.sample_urls.len(), 3);
    assert!(report.fingerprint.is_none());

    let stages: Vec<DomainStatus> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageStarted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            DomainStatus::AssessingSecurity,
            DomainStatus::QualityTesting,
            DomainStatus::FullScraping,
        ]
    );
    assert!(matches!(events.last(), Some(PipelineEvent::Finished { .. })));

    // The seed probe doubles as the first sample page
    let seed_fetches = harness
        .fetcher
        .calls()
        .iter()
        .filter(|(url, _)| url == "https://a.test/")
        .count();
    assert_eq!(seed_fetches, 1);
    assert_eq!(harness.fetcher.calls().len(), 6);

    let records = harness.storage.records_for("a.test");
    assert_eq!(records.len(), 6);
    let sampled = records
        .iter()
        .filter(|r| r.stage == DomainStatus::QualityTesting)
        .count();
    assert_eq!(sampled, 3);
}

#[tokio::test]
async fn test_challenge_escalates_to_proxy() {
    let site = Site::Open {
        pages: 4,
        min_strategy: Strategy::Proxy,
    };
    let harness = Harness::new(ScriptedFetcher::new(&[("b.test", site)]));
    let report = finish(&harness, "b.test").await;

    assert_eq!(report.status, DomainStatus::Completed);
    assert_eq!(report.strategy, Some(Strategy::Proxy));
    assert!(report.fingerprint.is_some());

    let direct = harness
        .fetcher
        .calls()
        .iter()
        .filter(|(_, s)| *s == Strategy::Direct)
        .count();
    assert_eq!(direct, 1);

    let profile = harness.cache.snapshot("b.test").unwrap().unwrap();
    assert_eq!(profile.escalation, Strategy::Proxy);
    assert_eq!(profile.stats_for(Strategy::Direct).failures, 1);
    assert!(profile.notes.iter().any(|n| n.contains("fingerprint")));
}

#[tokio::test]
async fn test_blocked_everywhere_goes_to_manual_review() {
    let harness = Harness::new(ScriptedFetcher::new(&[("c.test", Site::Blocked)]));
    let report = finish(&harness, "c.test").await;

    assert_eq!(report.status, DomainStatus::ManualReview);
    assert_eq!(report.strategy, Some(Strategy::ProxyWithBrowser));
    assert_eq!(report.records, 0);
    assert_eq!(report.fingerprint.as_ref().map(String::len), Some(64));
    assert!(report.error.unwrap().contains("No viable fetch strategy"));

    let strategies: Vec<Strategy> = harness.fetcher.calls().into_iter().map(|(_, s)| s).collect();
    assert_eq!(
        strategies,
        vec![Strategy::Direct, Strategy::Proxy, Strategy::ProxyWithBrowser]
    );
}

#[tokio::test]
async fn test_rate_limited_page_is_skipped_on_a_healthy_domain() {
    let site = Site::RateLimitedAt {
        pages: 6,
        limited: 2,
    };
    let harness = Harness::new(ScriptedFetcher::new(&[("k.test", site)]));
    harness.remember("k.test", Strategy::ProxyWithBrowser, FetchOutcome::Success, 50);
    let report = finish(&harness, "k.test").await;

    assert_eq!(report.status, DomainStatus::Completed);
    assert_eq!(report.records, 5);
    assert!(report.error.is_none());

    // backed off at the top strategy until the retry budget ran out
    let limited = harness.fetcher.calls_to("https://k.test/p2");
    assert_eq!(limited, vec![Strategy::ProxyWithBrowser; 3]);

    let profile = harness.cache.snapshot("k.test").unwrap().unwrap();
    assert!(!profile.is_exhausted());
    assert_eq!(profile.stats_for(Strategy::ProxyWithBrowser).successes, 55);
    assert_eq!(profile.stats_for(Strategy::ProxyWithBrowser).failures, 3);
}

#[tokio::test]
async fn test_blocked_seed_on_a_previously_fetched_domain_is_not_manual_review() {
    let harness = Harness::new(ScriptedFetcher::new(&[("l.test", Site::Blocked)]));
    harness.remember("l.test", Strategy::Direct, FetchOutcome::Success, 10);
    let report = finish(&harness, "l.test").await;

    // nothing could be sampled this time, but a strategy has worked before
    assert_eq!(report.status, DomainStatus::MarkedForReview);
    assert_eq!(report.quality.unwrap().samples, 0);
    assert_eq!(
        harness.fetcher.calls_to("https://l.test/"),
        vec![
            Strategy::Direct,
            Strategy::Proxy,
            Strategy::ProxyWithBrowser,
            Strategy::ProxyWithBrowser,
        ]
    );
}

#[tokio::test]
async fn test_transient_errors_exhaust_retries_without_escalating() {
    let harness = Harness::new(ScriptedFetcher::new(&[("d.test", Site::Down)]));
    let report = finish(&harness, "d.test").await;

    assert_eq!(report.status, DomainStatus::Failed);
    assert!(report.error.unwrap().contains("Retries exhausted"));

    let calls = harness.fetcher.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, s)| *s == Strategy::Direct));

    let profile = harness.cache.snapshot("d.test").unwrap().unwrap();
    assert_eq!(profile.escalation, Strategy::Direct);
    assert_eq!(profile.stats_for(Strategy::Direct).transient_errors, 3);
}

#[tokio::test]
async fn test_thin_content_is_marked_for_review_with_evidence_kept() {
    let harness = Harness::new(ScriptedFetcher::new(&[("e.test", Site::Thin { pages: 5 })]));
    let report = finish(&harness, "e.test").await;

    assert_eq!(report.status, DomainStatus::MarkedForReview);
    let quality = report.quality.unwrap();
    assert!(!quality.passed());
    assert_eq!(quality.samples, 3);
    assert_eq!(report.sample_urls.len(), 3);
    assert!(report.error.unwrap().contains("Quality below threshold"));

    // Sample records stay persisted; no full scrape happened
    let records = harness.storage.records_for("e.test");
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.stage == DomainStatus::QualityTesting));
    assert_eq!(harness.fetcher.calls().len(), 3);
}

#[tokio::test]
async fn test_persistence_failure_fails_the_domain() {
    let harness = Harness::new(ScriptedFetcher::new(&[("f.test", Site::open(4))]));
    harness.storage.fail_records_for("f.test");
    let report = finish(&harness, "f.test").await;

    assert_eq!(report.status, DomainStatus::Failed);
    assert!(report.error.unwrap().contains("Persistence failure"));
}

#[tokio::test]
async fn test_record_cap_stops_the_scrape() {
    let mut harness = Harness::new(ScriptedFetcher::new(&[("g.test", Site::open(20))]));
    harness.max_records = 5;
    let report = finish(&harness, "g.test").await;

    assert_eq!(report.status, DomainStatus::Completed);
    assert_eq!(report.records, 5);
    assert_eq!(harness.storage.records_for("g.test").len(), 5);
    assert_eq!(harness.fetcher.calls().len(), 5);
}

#[tokio::test]
async fn test_download_links_become_candidates() {
    let harness = Harness::new(ScriptedFetcher::new(&[("h.test", Site::WithDownload)]));
    let report = finish(&harness, "h.test").await;

    assert_eq!(report.status, DomainStatus::Completed);
    let downloads = harness.storage.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].url, "https://h.test/files/report.pdf");
    assert_eq!(downloads[0].referrer, "https://h.test/");
}

#[tokio::test]
async fn test_unknown_site_has_no_records() {
    let harness = Harness::new(ScriptedFetcher::new(&[]));
    let report = finish(&harness, "missing.test").await;

    // A 404 seed passes assessment but yields an empty sample
    assert_eq!(report.status, DomainStatus::MarkedForReview);
    assert_eq!(report.quality.unwrap().samples, 0);
}

#[tokio::test]
async fn test_resume_at_full_scraping_skips_earlier_stages() {
    let harness = Harness::new(ScriptedFetcher::new(&[("i.test", Site::open(3))]));
    let (outcome, events) = run_domain(&harness, "i.test", DomainStatus::FullScraping).await;

    let PipelineOutcome::Finished(report) = outcome else {
        panic!("pipeline was interrupted");
    };
    assert_eq!(report.status, DomainStatus::Completed);
    assert!(report.quality.is_none());
    assert_eq!(report.records, 3);

    let started = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::StageStarted { .. }))
        .count();
    assert_eq!(started, 1);
}

#[tokio::test]
async fn test_resumed_walk_does_not_duplicate_records() {
    let harness = Harness::new(ScriptedFetcher::new(&[("m.test", Site::open(4))]));
    let first = finish(&harness, "m.test").await;
    assert_eq!(first.records, 4);

    let (outcome, _) = run_domain(&harness, "m.test", DomainStatus::FullScraping).await;
    assert!(matches!(outcome, PipelineOutcome::Finished(ref r) if r.status == DomainStatus::Completed));

    let records = harness.storage.records_for("m.test");
    assert_eq!(records.len(), 4);
    let sampled = records
        .iter()
        .filter(|r| r.stage == DomainStatus::QualityTesting)
        .count();
    assert_eq!(sampled, 3);
}

#[tokio::test]
async fn test_cancellation_is_honored_between_stages() {
    let cancel = CancellationToken::new();
    let fetcher =
        ScriptedFetcher::new(&[("j.test", Site::open(3))]).cancel_after(1, cancel.clone());
    let harness = Harness::new(fetcher);

    let (tx, _rx) = mpsc::unbounded_channel();
    let outcome = harness
        .pipeline()
        .run(&Domain::new("j.test"), DomainStatus::AssessingSecurity, 0, &tx, &cancel)
        .await;

    match outcome {
        PipelineOutcome::Interrupted { resume_stage } => {
            assert_eq!(resume_stage, DomainStatus::QualityTesting)
        }
        other => panic!("expected an interruption, got {:?}", other),
    }
    assert_eq!(harness.fetcher.calls().len(), 1);
    assert!(harness.storage.records_for("j.test").is_empty());
}
