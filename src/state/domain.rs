use crate::config::DomainEntry;
use crate::url::strip_www;
use crate::{ConfigError, UrlError};
use url::Url;

/// A target domain and its boundary rules
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Lowercase root hostname without `www.`
    pub root: String,

    /// Explicit seed, if the entry declared one
    pub seed: Option<Url>,

    /// Other hostnames whose pages count as this domain's
    pub derivatives: Vec<String>,

    pub allow_subdomains: bool,
    pub allow_file_downloads: bool,
}

impl Domain {
    /// Creates a domain with the default boundary rules
    pub fn new(root: &str) -> Self {
        Self {
            root: normalize_host(root),
            seed: None,
            derivatives: Vec::new(),
            allow_subdomains: true,
            allow_file_downloads: true,
        }
    }

    /// Builds a domain from a config or domain-list entry
    pub fn from_entry(entry: &DomainEntry) -> Result<Self, ConfigError> {
        let seed = entry
            .seed
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| ConfigError::InvalidUrl(format!("seed for '{}': {}", entry.root, e)))?;

        Ok(Self {
            root: normalize_host(&entry.root),
            seed,
            derivatives: entry.derivatives.iter().map(|d| normalize_host(d)).collect(),
            allow_subdomains: entry.allow_subdomains,
            allow_file_downloads: entry.allow_file_downloads,
        })
    }

    /// The walk's starting point, `https://<root>/` unless declared
    pub fn seed_url(&self) -> Result<Url, UrlError> {
        match &self.seed {
            Some(seed) => Ok(seed.clone()),
            None => Url::parse(&format!("https://{}/", self.root))
                .map_err(|e| UrlError::Parse(e.to_string())),
        }
    }
}

fn normalize_host(host: &str) -> String {
    strip_www(&host.trim().to_lowercase()).to_string()
}
