//! Batch runs: worker pool, checkpointing and resume

use crate::support::{Harness, RecordingLog, ScriptedFetcher, Site};
use chrono::{Duration, Utc};
use nightcrawl::checkpoint::{Checkpoint, CheckpointStore};
use nightcrawl::crawler::BatchScheduler;
use nightcrawl::security::Strategy;
use nightcrawl::state::{Domain, DomainStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn mixed_sites() -> Vec<(&'static str, Site)> {
    vec![
        ("open.test", Site::open(4)),
        (
            "guarded.test",
            Site::Open {
                pages: 3,
                min_strategy: Strategy::ProxyWithBrowser,
            },
        ),
        ("blocked.test", Site::Blocked),
        ("down.test", Site::Down),
        ("thin.test", Site::Thin { pages: 4 }),
        ("tiny.test", Site::open(1)),
    ]
}

fn domains(sites: &[(&str, Site)]) -> Vec<Domain> {
    sites.iter().map(|(host, _)| Domain::new(host)).collect()
}

fn store(dir: &TempDir) -> CheckpointStore {
    CheckpointStore::new(dir.path().join("checkpoint.json"), 24)
}

fn scheduler(harness: &Harness, dir: &TempDir) -> BatchScheduler {
    BatchScheduler::new(Arc::new(harness.pipeline()), store(dir), "hash")
}

async fn statuses_with_workers(workers: usize) -> BTreeMap<String, DomainStatus> {
    let dir = TempDir::new().unwrap();
    let sites = mixed_sites();
    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let summary = scheduler(&harness, &dir)
        .run(&domains(&sites), workers, false)
        .await
        .unwrap();
    summary.statuses
}

#[tokio::test]
async fn test_worker_count_does_not_change_outcomes() {
    let single = statuses_with_workers(1).await;
    let pooled = statuses_with_workers(10).await;
    assert_eq!(single, pooled);

    assert_eq!(single["open.test"], DomainStatus::Completed);
    assert_eq!(single["guarded.test"], DomainStatus::Completed);
    assert_eq!(single["blocked.test"], DomainStatus::ManualReview);
    assert_eq!(single["down.test"], DomainStatus::Failed);
    assert_eq!(single["thin.test"], DomainStatus::MarkedForReview);
    assert_eq!(single["tiny.test"], DomainStatus::Completed);
}

#[tokio::test]
async fn test_dispatch_order_does_not_change_outcomes() {
    let sites = mixed_sites();
    let mut reversed = sites.clone();
    reversed.reverse();

    let mut outcomes = Vec::new();
    for order in [&sites, &reversed] {
        let dir = TempDir::new().unwrap();
        let harness = Harness::new(ScriptedFetcher::new(&sites));
        let summary = scheduler(&harness, &dir)
            .run(&domains(order), 3, false)
            .await
            .unwrap();
        outcomes.push(summary.statuses);
    }

    assert_eq!(outcomes[0].len(), sites.len());
    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn test_duplicate_roots_are_scheduled_once() {
    let dir = TempDir::new().unwrap();
    let sites = [("a.test", Site::open(2)), ("b.test", Site::open(2))];
    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let list = vec![
        Domain::new("a.test"),
        Domain::new("b.test"),
        Domain::new("a.test"),
    ];

    let mut scheduler = scheduler(&harness, &dir);
    let summary = scheduler.run(&list, 3, false).await.unwrap();

    assert_eq!(summary.processed(), 2);
    assert_eq!(harness.fetcher.calls_for("a.test").len(), 2);

    let checkpoint = scheduler.checkpoint().unwrap();
    checkpoint.validate().unwrap();
    assert_eq!(checkpoint.stats.attempted, 2);
    assert_eq!(checkpoint.completed.len(), 2);
}

#[tokio::test]
async fn test_run_leaves_a_consistent_checkpoint_and_log() {
    let dir = TempDir::new().unwrap();
    let sites = mixed_sites();
    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let log = RecordingLog::default();

    let mut scheduler = scheduler(&harness, &dir).with_run_log(Box::new(log.clone()));
    let summary = scheduler.run(&domains(&sites), 3, false).await.unwrap();

    assert_eq!(summary.processed(), sites.len());
    assert_eq!(summary.pending, 0);
    assert!(!summary.cancelled);
    assert_eq!(summary.total_records, 4 + 3 + 3 + 1);

    let checkpoint = store(&dir).load().await.expect("checkpoint on disk");
    checkpoint.validate().unwrap();
    assert_eq!(checkpoint.run_id, summary.run_id);
    assert!(checkpoint.pending.is_empty());
    assert!(checkpoint.in_flight.is_empty());
    assert_eq!(checkpoint.completed.len(), 3);
    assert_eq!(checkpoint.stats.attempted, sites.len() as u64);
    assert_eq!(checkpoint.stats.succeeded, 3);
    assert_eq!(Some(checkpoint), scheduler.checkpoint());

    let reports = log.reports.lock().unwrap();
    assert_eq!(reports.len(), sites.len());
    let mut reported: Vec<&str> = reports.iter().map(|r| r.domain.as_str()).collect();
    reported.sort();
    reported.dedup();
    assert_eq!(reported.len(), sites.len());
    assert_eq!(log.summaries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_resume_skips_terminal_domains() {
    let dir = TempDir::new().unwrap();
    let mut previous = Checkpoint::new("scrape_previous", "hash", ["a.test", "b.test"]);
    previous.move_to("a.test", DomainStatus::Completed);
    store(&dir).save(&previous).await.unwrap();

    let sites = [("a.test", Site::open(2)), ("b.test", Site::open(2))];
    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let mut scheduler = scheduler(&harness, &dir);
    let summary = scheduler.run(&domains(&sites), 2, true).await.unwrap();

    assert_eq!(summary.run_id, "scrape_previous");
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.statuses.len(), 1);
    assert_eq!(summary.statuses["b.test"], DomainStatus::Completed);
    assert!(harness.fetcher.calls_for("a.test").is_empty());
    assert!(!harness.fetcher.calls_for("b.test").is_empty());

    let checkpoint = scheduler.checkpoint().unwrap();
    assert_eq!(checkpoint.status_of("a.test"), Some(DomainStatus::Completed));
    assert_eq!(checkpoint.status_of("b.test"), Some(DomainStatus::Completed));
}

#[tokio::test]
async fn test_stale_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let mut previous = Checkpoint::new("scrape_old", "hash", ["a.test"]);
    previous.move_to("a.test", DomainStatus::Completed);
    previous.updated_at = Utc::now() - Duration::hours(25);
    store(&dir).save(&previous).await.unwrap();

    let sites = [("a.test", Site::open(2))];
    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let summary = scheduler(&harness, &dir)
        .run(&domains(&sites), 1, true)
        .await
        .unwrap();

    assert_ne!(summary.run_id, "scrape_old");
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.statuses["a.test"], DomainStatus::Completed);
}

#[tokio::test]
async fn test_fresh_run_ignores_a_valid_checkpoint() {
    let dir = TempDir::new().unwrap();
    let mut previous = Checkpoint::new("scrape_previous", "hash", ["a.test"]);
    previous.move_to("a.test", DomainStatus::Completed);
    store(&dir).save(&previous).await.unwrap();

    let sites = [("a.test", Site::open(2))];
    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let summary = scheduler(&harness, &dir)
        .run(&domains(&sites), 1, false)
        .await
        .unwrap();

    assert_ne!(summary.run_id, "scrape_previous");
    assert_eq!(summary.processed(), 1);
}

#[tokio::test]
async fn test_cancelled_run_resumes_from_next_stage() {
    let dir = TempDir::new().unwrap();
    let sites = [("a.test", Site::open(3)), ("b.test", Site::open(3))];

    let cancel = CancellationToken::new();
    let harness =
        Harness::new(ScriptedFetcher::new(&sites).cancel_after(1, cancel.clone()));
    let first = scheduler(&harness, &dir)
        .with_cancellation(cancel)
        .run(&domains(&sites), 1, true)
        .await
        .unwrap();

    assert!(first.cancelled);
    assert_eq!(first.processed(), 0);
    assert_eq!(first.pending, 2);

    let saved = store(&dir).load().await.expect("checkpoint on disk");
    saved.validate().unwrap();
    assert_eq!(saved.pending.len(), 2);
    assert_eq!(saved.resume_stage("a.test"), DomainStatus::QualityTesting);
    assert_eq!(saved.resume_stage("b.test"), DomainStatus::AssessingSecurity);

    let harness = Harness::new(ScriptedFetcher::new(&sites));
    let second = scheduler(&harness, &dir)
        .run(&domains(&sites), 1, true)
        .await
        .unwrap();

    assert_eq!(second.run_id, first.run_id);
    assert_eq!(second.statuses["a.test"], DomainStatus::Completed);
    assert_eq!(second.statuses["b.test"], DomainStatus::Completed);

    let done = store(&dir).load().await.unwrap();
    assert!(done.resume_stages.is_empty());
    assert_eq!(done.completed.len(), 2);
}

#[tokio::test]
async fn test_empty_domain_list_is_rejected() {
    let dir = TempDir::new().unwrap();
    let harness = Harness::new(ScriptedFetcher::new(&[]));
    let result = scheduler(&harness, &dir).run(&[], 2, true).await;
    assert!(matches!(
        result,
        Err(nightcrawl::NightcrawlError::EmptyDomainList)
    ));
}
