use crate::config::types::{
    CheckpointConfig, Config, DomainEntry, FetcherConfig, OrchestratorConfig, OutputConfig,
    QualityConfig, RetryConfig, SecurityConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_orchestrator_config(&config.orchestrator)?;
    validate_security_config(&config.security)?;
    validate_quality_config(&config.quality)?;
    validate_retry_config(&config.retry)?;
    validate_checkpoint_config(&config.checkpoint)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    validate_domain_entries(&config.domains)?;
    Ok(())
}

fn validate_orchestrator_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    validate_worker_count(config.workers)?;

    if config.max_records < 1 {
        return Err(ConfigError::Validation(format!(
            "max-records must be >= 1, got {}",
            config.max_records
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates a worker count, also used for the `--workers` override
pub fn validate_worker_count(workers: u32) -> Result<(), ConfigError> {
    if !(1..=100).contains(&workers) {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            workers
        )));
    }
    Ok(())
}

fn validate_security_config(config: &SecurityConfig) -> Result<(), ConfigError> {
    if config.min_confidence < 1 {
        return Err(ConfigError::Validation(
            "min-confidence must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_quality_config(config: &QualityConfig) -> Result<(), ConfigError> {
    if config.sample_size < 1 {
        return Err(ConfigError::Validation(
            "sample-size must be >= 1".to_string(),
        ));
    }

    if !(config.min_text_ratio > 0.0 && config.min_text_ratio <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "min-text-ratio must be in (0, 1], got {}",
            config.min_text_ratio
        )));
    }

    if config.low_confidence_penalty < 1.0 {
        return Err(ConfigError::Validation(format!(
            "low-confidence-penalty must be >= 1.0, got {}",
            config.low_confidence_penalty
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-attempts must be >= 1".to_string(),
        ));
    }

    if config.initial_backoff_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "initial-backoff-ms ({}) cannot exceed max-backoff-ms ({})",
            config.initial_backoff_ms, config.max_backoff_ms
        )));
    }

    if !(0.0..=1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be between 0.0 and 1.0, got {}",
            config.jitter
        )));
    }

    Ok(())
}

fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint path cannot be empty".to_string(),
        ));
    }

    if config.staleness_hours < 1 {
        return Err(ConfigError::Validation(
            "staleness-hours must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy_url {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy-url: {}", e)))?;
    }

    if let Some(endpoint) = &config.render_endpoint {
        validate_http_url(endpoint, "render-endpoint")?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.run_log_dir.is_empty() {
        return Err(ConfigError::Validation(
            "run-log-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_domain_entries(entries: &[DomainEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        validate_domain_string(strip_www(&entry.root))?;

        for derivative in &entry.derivatives {
            validate_domain_string(strip_www(derivative))?;
        }

        if let Some(seed) = &entry.seed {
            validate_http_url(seed, &format!("seed for '{}'", entry.root))?;
        }
    }
    Ok(())
}

fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, raw
        )));
    }

    Ok(())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Validates a bare hostname such as `example.com`
pub fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with(['.', '-']) || domain.ends_with(['.', '-']) {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
