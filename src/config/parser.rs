use crate::config::types::{Config, DomainEntry};
use crate::config::validation::{validate, validate_domain_string};
use crate::state::Domain;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads, parses and validates a configuration file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use nightcrawl::config::load_config;
///
/// let config = load_config(Path::new("nightcrawl.toml")).unwrap();
/// println!("Workers: {}", config.orchestrator.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored in the checkpoint so a resume under a changed configuration can be
/// reported.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Parses a plain-text domain list
///
/// One domain per line. Blank lines and `#` comments are skipped, and any
/// scheme, `www.` prefix, port or trailing path is dropped.
pub fn parse_domain_list(content: &str) -> Result<Vec<DomainEntry>, ConfigError> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let host = line
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let host = host.split(['/', '?', '#']).next().unwrap_or(host);
        let host = host.split(':').next().unwrap_or(host);
        let host = host.to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);

        validate_domain_string(host)?;
        entries.push(DomainEntry::from_root(host));
    }

    Ok(entries)
}

/// Reads and parses a domain list file
pub fn load_domain_list(path: &Path) -> Result<Vec<DomainEntry>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::DomainList {
        path: path.display().to_string(),
        source,
    })?;
    parse_domain_list(&content)
}

/// Builds the ordered domain list for a run
///
/// Entries from the `domain-list` file come first, then inline `[[domain]]`
/// entries. Duplicates by root are dropped, keeping the first occurrence. A
/// relative `domain-list` path is resolved against `config_dir`.
pub fn resolve_domains(config: &Config, config_dir: &Path) -> Result<Vec<Domain>, ConfigError> {
    let mut entries = Vec::new();

    if let Some(list) = &config.domain_list {
        let list_path = Path::new(list);
        let list_path = if list_path.is_relative() {
            config_dir.join(list_path)
        } else {
            list_path.to_path_buf()
        };
        entries.extend(load_domain_list(&list_path)?);
    }
    entries.extend(config.domains.iter().cloned());

    let mut seen = HashSet::new();
    let mut domains = Vec::with_capacity(entries.len());
    for entry in &entries {
        let domain = Domain::from_entry(entry)?;
        if seen.insert(domain.root.clone()) {
            domains.push(domain);
        } else {
            tracing::debug!(domain = %domain.root, "Skipping duplicate domain entry");
        }
    }

    Ok(domains)
}
