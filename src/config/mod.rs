//! Configuration module for Nightcrawl
//!
//! Loads the TOML run configuration, validates it and resolves the ordered
//! domain list from the optional list file plus inline `[[domain]]` entries.
//!
//! # Example
//!
//! ```no_run
//! use nightcrawl::config::{load_config, resolve_domains};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("nightcrawl.toml")).unwrap();
//! let domains = resolve_domains(&config, Path::new(".")).unwrap();
//! println!("{} domains, {} workers", domains.len(), config.orchestrator.workers);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CheckpointConfig, Config, DomainEntry, FetcherConfig, OrchestratorConfig, OutputConfig,
    QualityConfig, RetryConfig, SecurityConfig,
};

pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_domain_list, parse_domain_list,
    resolve_domains,
};

pub use validation::{validate_domain_string, validate_worker_count};
