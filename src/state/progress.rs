use crate::state::DomainStatus;
use crate::NightcrawlError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Per-domain run state
///
/// Owned by the worker driving the domain. Once terminal it no longer
/// changes; any further transition is rejected.
#[derive(Debug, Clone)]
pub struct DomainProgress {
    pub domain: String,
    pub status: DomainStatus,

    /// Fetch attempts made in each stage
    pub attempts: BTreeMap<DomainStatus, u32>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub last_error: Option<String>,

    /// Records persisted so far, sample records included
    pub records: u64,
}

impl DomainProgress {
    pub fn new(domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            domain: domain.into(),
            status: DomainStatus::Pending,
            attempts: BTreeMap::new(),
            started_at: now,
            updated_at: now,
            finished_at: None,
            last_error: None,
            records: 0,
        }
    }

    /// Moves to `to`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, to: DomainStatus) -> Result<(), NightcrawlError> {
        if !self.status.can_transition_to(to) {
            return Err(NightcrawlError::InvalidTransition {
                domain: self.domain.clone(),
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Counts one fetch attempt against the current stage
    pub fn record_attempt(&mut self) {
        *self.attempts.entry(self.status).or_insert(0) += 1;
        self.updated_at = Utc::now();
    }

    pub fn attempts_in(&self, stage: DomainStatus) -> u32 {
        self.attempts.get(&stage).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.values().sum()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Wall time from creation to finish (or to now while active)
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_is_pending() {
        let progress = DomainProgress::new("example.com");
        assert_eq!(progress.status, DomainStatus::Pending);
        assert_eq!(progress.total_attempts(), 0);
        assert!(progress.finished_at.is_none());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut progress = DomainProgress::new("example.com");
        progress.transition(DomainStatus::AssessingSecurity).unwrap();
        progress.transition(DomainStatus::QualityTesting).unwrap();
        progress.transition(DomainStatus::FullScraping).unwrap();
        progress.transition(DomainStatus::Completed).unwrap();
        assert!(progress.finished_at.is_some());
    }

    #[test]
    fn test_terminal_is_immutable() {
        let mut progress = DomainProgress::new("example.com");
        progress.transition(DomainStatus::Failed).unwrap();

        let err = progress.transition(DomainStatus::Pending).unwrap_err();
        assert!(matches!(
            err,
            NightcrawlError::InvalidTransition {
                from: DomainStatus::Failed,
                to: DomainStatus::Pending,
                ..
            }
        ));
        assert_eq!(progress.status, DomainStatus::Failed);
    }

    #[test]
    fn test_attempts_counted_per_stage() {
        let mut progress = DomainProgress::new("example.com");
        progress.transition(DomainStatus::AssessingSecurity).unwrap();
        progress.record_attempt();
        progress.record_attempt();
        progress.transition(DomainStatus::QualityTesting).unwrap();
        progress.record_attempt();

        assert_eq!(progress.attempts_in(DomainStatus::AssessingSecurity), 2);
        assert_eq!(progress.attempts_in(DomainStatus::QualityTesting), 1);
        assert_eq!(progress.attempts_in(DomainStatus::FullScraping), 0);
        assert_eq!(progress.total_attempts(), 3);
    }

    #[test]
    fn test_interrupted_stage_returns_to_pending() {
        let mut progress = DomainProgress::new("example.com");
        progress.transition(DomainStatus::AssessingSecurity).unwrap();
        progress.transition(DomainStatus::Pending).unwrap();
        assert!(progress.finished_at.is_none());
    }
}
