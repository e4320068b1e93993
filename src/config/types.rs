use serde::Deserialize;

/// Main configuration structure for Nightcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,

    /// Optional plain-text domain list, one root per line
    #[serde(rename = "domain-list", default)]
    pub domain_list: Option<String>,

    #[serde(rename = "domain", default)]
    pub domains: Vec<DomainEntry>,
}

/// Worker pool and per-domain extraction caps
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of domains processed in parallel
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Record cap per domain for the full scrape
    #[serde(rename = "max-records", default = "default_max_records")]
    pub max_records: u64,

    /// Page cap per domain walk, regardless of records produced
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,
}

/// Decision cache tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Attempts a strategy needs before its success rate is trusted
    #[serde(rename = "min-confidence", default = "default_min_confidence")]
    pub min_confidence: u32,
}

/// Quality gate thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct QualityConfig {
    #[serde(rename = "sample-size", default = "default_sample_size")]
    pub sample_size: usize,

    #[serde(rename = "min-text-ratio", default = "default_min_text_ratio")]
    pub min_text_ratio: f64,

    /// Threshold multiplier applied when the sample is under half size
    #[serde(
        rename = "low-confidence-penalty",
        default = "default_low_confidence_penalty"
    )]
    pub low_confidence_penalty: f64,
}

/// Bounded retry policy for transient fetch errors
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Jitter as a fraction of the computed delay (0.0 - 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "default_checkpoint_path")]
    pub path: String,

    /// A checkpoint older than this is never resumed from
    #[serde(rename = "staleness-hours", default = "default_staleness_hours")]
    pub staleness_hours: u64,
}

/// Default HTTP fetcher settings
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Rotating proxy used by the Proxy and ProxyWithBrowser strategies
    #[serde(rename = "proxy-url", default)]
    pub proxy_url: Option<String>,

    /// Rendering service used by the ProxyWithBrowser strategy
    #[serde(rename = "render-endpoint", default)]
    pub render_endpoint: Option<String>,

    /// 2xx bodies shorter than this are treated as empty content
    #[serde(rename = "min-body-length", default = "default_min_body_length")]
    pub min_body_length: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving the markdown run logs
    #[serde(rename = "run-log-dir", default = "default_run_log_dir")]
    pub run_log_dir: String,
}

/// A target domain declared inline in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Root hostname (e.g., "example.com")
    pub root: String,

    /// Starting URL; defaults to `https://<root>/`
    #[serde(default)]
    pub seed: Option<String>,

    /// Other hostnames considered part of this domain
    #[serde(default)]
    pub derivatives: Vec<String>,

    #[serde(rename = "allow-subdomains", default = "default_true")]
    pub allow_subdomains: bool,

    #[serde(rename = "allow-file-downloads", default = "default_true")]
    pub allow_file_downloads: bool,
}

impl DomainEntry {
    /// Entry with default boundary rules for a bare root
    pub fn from_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            seed: None,
            derivatives: Vec::new(),
            allow_subdomains: true,
            allow_file_downloads: true,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_records: default_max_records(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            min_text_ratio: default_min_text_ratio(),
            low_confidence_penalty: default_low_confidence_penalty(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: default_checkpoint_path(),
            staleness_hours: default_staleness_hours(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            proxy_url: None,
            render_endpoint: None,
            min_body_length: default_min_body_length(),
        }
    }
}

fn default_workers() -> u32 {
    10
}

fn default_max_records() -> u64 {
    2000
}

fn default_max_pages() -> u32 {
    4000
}

fn default_min_confidence() -> u32 {
    5
}

fn default_sample_size() -> usize {
    10
}

fn default_min_text_ratio() -> f64 {
    0.15
}

fn default_low_confidence_penalty() -> f64 {
    1.5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_jitter() -> f64 {
    0.2
}

fn default_checkpoint_path() -> String {
    "checkpoints/scrape_checkpoint.json".to_string()
}

fn default_staleness_hours() -> u64 {
    24
}

fn default_user_agent() -> String {
    format!("nightcrawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_min_body_length() -> usize {
    1000
}

fn default_run_log_dir() -> String {
    "logs".to_string()
}

fn default_true() -> bool {
    true
}
