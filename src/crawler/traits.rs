//! Collaborator seams for fetching and extraction
//!
//! The pipeline only sees these traits; the reqwest and scraper backed
//! defaults live next door and tests plug in scripted fakes.

use crate::security::{FetchOutcome, Strategy};
use async_trait::async_trait;
use url::Url;

/// What came back from one fetch attempt
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status, 0 when no response was received
    pub status: u16,
    pub body: String,
    pub outcome: FetchOutcome,
    /// Transport error or detection marker, for the evidence trail
    pub detail: Option<String>,
}

impl FetchResponse {
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` using `strategy`; never fails, the outcome says how it went
    async fn fetch(&self, url: &Url, strategy: Strategy) -> FetchResponse;
}

/// Text and links pulled out of one document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub title: Option<String>,
    pub text: String,
    pub record_count: usize,
    /// Absolute HTTP(S) links in document order
    pub links: Vec<String>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str, base_url: &Url) -> Extraction;
}
