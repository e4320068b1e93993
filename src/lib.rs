//! Nightcrawl: an overnight batch crawler for a fixed list of domains
//!
//! Each domain is driven through a security assessment, a quality test on a
//! small sample and a capped full extraction. The fetch strategy per domain
//! (direct, proxy, proxy with browser rendering) is learned and persisted
//! across runs, and an interrupted batch resumes from its checkpoint.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod output;
pub mod quality;
pub mod security;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Nightcrawl operations
#[derive(Debug, Error)]
pub enum NightcrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Run log error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition for {domain}: {from:?} -> {to:?}")]
    InvalidTransition {
        domain: String,
        from: state::DomainStatus,
        to: state::DomainStatus,
    },

    #[error("Domain list is empty")]
    EmptyDomainList,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Failed to load domain list {path}: {source}")]
    DomainList {
        path: String,
        source: std::io::Error,
    },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Failures that end a single domain's pipeline
///
/// None of these abort the batch; the scheduler maps each one to a terminal
/// status and carries on with the next domain.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("No viable fetch strategy left for {domain}")]
    NoViableStrategy { domain: String },

    #[error("Retries exhausted for {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("Quality below threshold: {ratio:.3} < {threshold:.3}")]
    QualityBelowThreshold { ratio: f64, threshold: f64 },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error(transparent)]
    Transition(#[from] NightcrawlError),
}

/// Result type alias for Nightcrawl operations
pub type Result<T> = std::result::Result<T, NightcrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::Config;
pub use crawler::{run_batch, BatchScheduler, DomainPipeline};
pub use output::RunSummary;
pub use quality::{QualityGate, QualityVerdict};
pub use security::{DecisionCache, FetchOutcome, SecurityProfile, Strategy};
pub use state::{Domain, DomainProgress, DomainStatus};
pub use url::{classify, extract_domain, normalize_url, Classification};
