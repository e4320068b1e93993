//! Nightcrawl main entry point
//!
//! Command-line interface for the overnight domain scraping batch.

use anyhow::Context;
use clap::Parser;
use nightcrawl::config::{load_config_with_hash, resolve_domains, Config};
use nightcrawl::crawler::{load_status, run_batch, BatchOptions};
use nightcrawl::output::print_status;
use nightcrawl::state::{Domain, DomainStatus};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Nightcrawl: batch scraping over a fixed list of domains
///
/// Each domain is assessed for bot protection, quality-tested on a small
/// sample and then scraped up to a record cap. Interrupted runs resume from
/// the last checkpoint.
#[derive(Parser, Debug)]
#[command(name = "nightcrawl")]
#[command(version)]
#[command(about = "Domain-scrape orchestration engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume from a recent checkpoint (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh run, ignoring any checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Override the configured number of parallel workers
    #[arg(long, value_name = "N")]
    workers: Option<u32>,

    /// Validate config and show the domain list without scraping
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show the current checkpoint and security profiles and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded (hash: {})", config_hash);

    if let Some(workers) = cli.workers {
        nightcrawl::config::validate_worker_count(workers)?;
    }

    if cli.status {
        let (checkpoint, profiles) = load_status(&config).await?;
        print_status(checkpoint.as_ref(), &profiles);
        return Ok(());
    }

    let config_dir = cli.config.parent().unwrap_or_else(|| Path::new("."));
    let domains = resolve_domains(&config, config_dir).context("failed to load domain list")?;

    if cli.dry_run {
        print_dry_run(&config, &domains, cli.workers);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing current stages");
                cancel.cancel();
            }
        });
    }

    let options = BatchOptions {
        resume: cli.resume || !cli.fresh,
        workers: cli.workers,
    };
    if cli.fresh {
        tracing::info!("Starting fresh run (ignoring checkpoint)");
    }

    let summary = run_batch(&config, &config_hash, &domains, options, cancel).await?;

    println!(
        "Run {}: {} processed, {} completed, {} marked for review, {} manual review, {} failed, {} pending ({:.1}% success, {} records)",
        summary.run_id,
        summary.processed(),
        summary.count(DomainStatus::Completed),
        summary.count(DomainStatus::MarkedForReview),
        summary.count(DomainStatus::ManualReview),
        summary.count(DomainStatus::Failed),
        summary.pending,
        summary.success_rate(),
        summary.total_records
    );
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("nightcrawl=info,warn"),
            1 => EnvFilter::new("nightcrawl=debug,info"),
            2 => EnvFilter::new("nightcrawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn print_dry_run(config: &Config, domains: &[Domain], workers: Option<u32>) {
    println!("=== Nightcrawl Dry Run ===\n");

    println!("Orchestrator:");
    println!(
        "  Workers: {}",
        workers.unwrap_or(config.orchestrator.workers)
    );
    println!("  Max records per domain: {}", config.orchestrator.max_records);
    println!("  Max pages per domain: {}", config.orchestrator.max_pages);

    println!("\nSecurity:");
    println!("  Minimum confidence: {} attempts", config.security.min_confidence);
    println!(
        "  Proxy: {}",
        config.fetcher.proxy_url.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Render endpoint: {}",
        config.fetcher.render_endpoint.as_deref().unwrap_or("(none)")
    );

    println!("\nQuality:");
    println!("  Sample size: {}", config.quality.sample_size);
    println!("  Minimum text ratio: {:.2}", config.quality.min_text_ratio);

    println!("\nCheckpoint:");
    println!("  Path: {}", config.checkpoint.path);
    println!("  Staleness window: {}h", config.checkpoint.staleness_hours);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Run logs: {}", config.output.run_log_dir);

    println!("\nDomains ({}):", domains.len());
    for domain in domains {
        let seed = domain
            .seed_url()
            .map(|u| u.to_string())
            .unwrap_or_else(|e| format!("invalid seed: {}", e));
        println!("  - {} ({})", domain.root, seed);
        for derivative in &domain.derivatives {
            println!("    * {}", derivative);
        }
    }

    println!("\n✓ Configuration is valid");
}
