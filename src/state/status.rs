//! Domain status definitions
//!
//! Every domain in a run is in exactly one of these states. The active states
//! double as the pipeline stages.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a domain stands in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    // ===== Active States =====
    /// Waiting in the backlog, or interrupted and resumable
    Pending,

    /// Probing the seed URL to settle on a fetch strategy
    AssessingSecurity,

    /// Fetching and judging the quality sample
    QualityTesting,

    /// Extracting up to the record cap
    FullScraping,

    // ===== Terminal States =====
    /// Finished with at least one record
    Completed,

    /// Finished without usable content (quality gate failed or zero records)
    MarkedForReview,

    /// Every fetch strategy was blocked
    ManualReview,

    /// Retries exhausted or records could not be persisted
    Failed,
}

impl DomainStatus {
    /// Returns true if no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::MarkedForReview | Self::ManualReview | Self::Failed
        )
    }

    /// Returns true while a worker is driving the domain
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::AssessingSecurity | Self::QualityTesting | Self::FullScraping
        )
    }

    /// Stage that follows this one on the success path
    pub fn next_stage(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::AssessingSecurity),
            Self::AssessingSecurity => Some(Self::QualityTesting),
            Self::QualityTesting => Some(Self::FullScraping),
            Self::FullScraping => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether the state machine permits moving from `self` to `to`
    ///
    /// Any active state may fall back to `Pending` on cancellation, and a
    /// resumed domain may jump from `Pending` straight to a later stage.
    pub fn can_transition_to(&self, to: Self) -> bool {
        use DomainStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (_, Failed) => true,
            (Pending, AssessingSecurity | QualityTesting | FullScraping) => true,
            (AssessingSecurity, QualityTesting | ManualReview) => true,
            (QualityTesting, FullScraping | MarkedForReview | ManualReview) => true,
            (FullScraping, Completed | MarkedForReview | ManualReview) => true,
            (AssessingSecurity | QualityTesting | FullScraping, Pending) => true,
            _ => false,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AssessingSecurity => "assessing_security",
            Self::QualityTesting => "quality_testing",
            Self::FullScraping => "full_scraping",
            Self::Completed => "completed",
            Self::MarkedForReview => "marked_for_review",
            Self::ManualReview => "manual_review",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::all_states()
            .into_iter()
            .find(|state| state.to_db_string() == s)
    }

    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::AssessingSecurity,
            Self::QualityTesting,
            Self::FullScraping,
            Self::Completed,
            Self::MarkedForReview,
            Self::ManualReview,
            Self::Failed,
        ]
    }

    pub fn terminal_states() -> [Self; 4] {
        [
            Self::Completed,
            Self::MarkedForReview,
            Self::ManualReview,
            Self::Failed,
        ]
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::AssessingSecurity => "Assessing Security",
            Self::QualityTesting => "Quality Testing",
            Self::FullScraping => "Full Scraping",
            Self::Completed => "Completed",
            Self::MarkedForReview => "Marked For Review",
            Self::ManualReview => "Manual Review",
            Self::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}
