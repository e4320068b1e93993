//! HTTP fetcher with three transports
//!
//! `Direct` uses a plain reqwest client, `Proxy` routes the same requests
//! through the configured proxy, and `ProxyWithBrowser` hands the URL to a
//! rendering service. Every response is classified into a `FetchOutcome`.

use crate::config::FetcherConfig;
use crate::crawler::traits::{FetchResponse, Fetcher};
use crate::security::{FetchOutcome, Strategy};
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Body markers of bot-protection interstitials, matched case-insensitively
const CHALLENGE_MARKERS: &[&str] = &[
    "just a moment",
    "checking your browser",
    "_cf_chl_opt",
    "__cf_bm",
    "captcha",
    "recaptcha",
    "hcaptcha",
    "turnstile",
    "verify you are human",
    "enable javascript",
    "bot manager",
];

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    url: &'a str,
    proxy: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    status: u16,
    html: String,
}

pub struct HttpFetcher {
    direct: Client,
    proxied: Option<Client>,
    proxy_url: Option<String>,
    render_endpoint: Option<Url>,
    min_body_length: usize,
}

/// Builds a client with the configured user agent, timeout and compression
fn build_http_client(config: &FetcherConfig, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        let direct = build_http_client(config, None)?;

        let proxied = match config.proxy_url.as_deref() {
            Some(proxy) => Some(build_http_client(config, Some(proxy))?),
            None => {
                warn!("No proxy configured, proxy strategies fall back to direct requests");
                None
            }
        };

        let render_endpoint = match config.render_endpoint.as_deref() {
            Some(endpoint) => match Url::parse(endpoint) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Ignoring invalid render endpoint {}: {}", endpoint, e);
                    None
                }
            },
            None => {
                warn!("No render endpoint configured, browser strategy falls back to proxy");
                None
            }
        };

        Ok(Self {
            direct,
            proxied,
            proxy_url: config.proxy_url.clone(),
            render_endpoint,
            min_body_length: config.min_body_length,
        })
    }

    fn client_for(&self, strategy: Strategy) -> &Client {
        match strategy {
            Strategy::Direct => &self.direct,
            Strategy::Proxy | Strategy::ProxyWithBrowser => {
                self.proxied.as_ref().unwrap_or(&self.direct)
            }
        }
    }

    async fn fetch_plain(&self, url: &Url, strategy: Strategy) -> FetchResponse {
        let response = match self.client_for(strategy).get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(url, &e),
        };

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => self.classify(final_url, status, body),
            Err(e) => transport_failure(url, &e),
        }
    }

    async fn fetch_rendered(&self, endpoint: &Url, url: &Url) -> FetchResponse {
        let request = RenderRequest {
            url: url.as_str(),
            proxy: self.proxy_url.as_deref(),
        };

        let response = match self.direct.post(endpoint.as_str()).json(&request).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(url, &e),
        };
        if !response.status().is_success() {
            return FetchResponse {
                url: url.to_string(),
                status: 0,
                body: String::new(),
                outcome: FetchOutcome::RetryableError,
                detail: Some(format!("render service returned {}", response.status())),
            };
        }

        match response.json::<RenderResponse>().await {
            Ok(rendered) => self.classify(url.to_string(), rendered.status, rendered.html),
            Err(e) => transport_failure(url, &e),
        }
    }

    /// Maps status and body to an outcome
    pub fn classify(&self, url: String, status: u16, body: String) -> FetchResponse {
        let (outcome, detail) = classify_response(status, &body, self.min_body_length);
        FetchResponse {
            url,
            status,
            body,
            outcome,
            detail,
        }
    }
}

fn classify_response(status: u16, body: &str, min_body_length: usize) -> (FetchOutcome, Option<String>) {
    if status == 429 {
        return (FetchOutcome::RateLimited, Some("HTTP 429".to_string()));
    }
    if status == 403 {
        return (FetchOutcome::ChallengeDetected, Some("HTTP 403".to_string()));
    }
    if let Some(marker) = find_challenge_marker(body) {
        return (
            FetchOutcome::ChallengeDetected,
            Some(format!("challenge marker '{}'", marker)),
        );
    }
    if status >= 500 {
        return (FetchOutcome::RetryableError, Some(format!("HTTP {}", status)));
    }
    if (200..300).contains(&status) && body.trim().len() < min_body_length {
        return (
            FetchOutcome::EmptyContent,
            Some(format!("body of {} bytes", body.trim().len())),
        );
    }
    (FetchOutcome::Success, None)
}

fn find_challenge_marker(body: &str) -> Option<&'static str> {
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().copied().find(|m| lower.contains(m))
}

fn transport_failure(url: &Url, e: &reqwest::Error) -> FetchResponse {
    let detail = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        "connection refused".to_string()
    } else {
        e.to_string()
    };
    debug!("Transport failure for {}: {}", url, detail);

    FetchResponse {
        url: url.to_string(),
        status: 0,
        body: String::new(),
        outcome: FetchOutcome::RetryableError,
        detail: Some(detail),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, strategy: Strategy) -> FetchResponse {
        match (strategy, &self.render_endpoint) {
            (Strategy::ProxyWithBrowser, Some(endpoint)) => self.fetch_rendered(endpoint, url).await,
            _ => self.fetch_plain(url, strategy).await,
        }
    }
}
