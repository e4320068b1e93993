use serde::{Deserialize, Serialize};
use std::fmt;

/// A fetch technique, ordered from cheapest to most capable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Proxy,
    ProxyWithBrowser,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Self::Direct, Self::Proxy, Self::ProxyWithBrowser];

    /// The next escalation step, `None` at the top
    pub fn escalate(&self) -> Option<Self> {
        match self {
            Self::Direct => Some(Self::Proxy),
            Self::Proxy => Some(Self::ProxyWithBrowser),
            Self::ProxyWithBrowser => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Proxy => "proxy",
            Self::ProxyWithBrowser => "proxy_with_browser",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.to_db_string() == s)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// How a single fetch attempt went, as judged by the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Success,
    /// Timeout, connection error or 5xx; retried at the same strategy
    RetryableError,
    ChallengeDetected,
    EmptyContent,
    RateLimited,
}

impl FetchOutcome {
    /// Outcomes that mean the current strategy is being blocked
    pub fn is_failure_signature(&self) -> bool {
        matches!(
            self,
            Self::ChallengeDetected | Self::EmptyContent | Self::RateLimited
        )
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::RetryableError => "retryable_error",
            Self::ChallengeDetected => "challenge_detected",
            Self::EmptyContent => "empty_content",
            Self::RateLimited => "rate_limited",
        };
        f.write_str(name)
    }
}
