use crate::checkpoint::CheckpointError;
use crate::state::DomainStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bumped whenever the on-disk layout changes
pub const SCHEMA_VERSION: u32 = 1;

/// What a worker is busy with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight {
    pub domain: String,
    pub stage: DomainStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointStats {
    /// Domains that reached a terminal status
    pub attempted: u64,
    /// Domains that ended `Completed`
    pub succeeded: u64,
    pub records_extracted: u64,
}

/// Durable snapshot of batch progress
///
/// Every known domain sits in exactly one bucket. Domains being worked on
/// stay in `pending` (and appear in `in_flight`) until they turn terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// Staleness is measured from here
    pub updated_at: DateTime<Utc>,
    pub config_hash: String,

    pub pending: BTreeSet<String>,
    pub completed: BTreeSet<String>,
    pub marked_for_review: BTreeSet<String>,
    pub manual_review: BTreeSet<String>,
    pub failed: BTreeSet<String>,

    /// Worker index -> current domain and stage
    pub in_flight: BTreeMap<usize, InFlight>,

    /// Interrupted domains and the stage they resume at
    pub resume_stages: BTreeMap<String, DomainStatus>,

    pub stats: CheckpointStats,
}

/// `scrape_YYYY-MM-DD_HH-MM-SS`
pub fn generate_run_id(now: DateTime<Utc>) -> String {
    format!("scrape_{}", now.format("%Y-%m-%d_%H-%M-%S"))
}

impl Checkpoint {
    /// Fresh checkpoint with every domain pending
    pub fn new<'a>(
        run_id: impl Into<String>,
        config_hash: impl Into<String>,
        domains: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            schema_version: SCHEMA_VERSION,
            run_id: run_id.into(),
            created_at: now,
            updated_at: now,
            config_hash: config_hash.into(),
            pending: domains.into_iter().map(str::to_string).collect(),
            completed: BTreeSet::new(),
            marked_for_review: BTreeSet::new(),
            manual_review: BTreeSet::new(),
            failed: BTreeSet::new(),
            in_flight: BTreeMap::new(),
            resume_stages: BTreeMap::new(),
            stats: CheckpointStats::default(),
        }
    }

    fn buckets(&self) -> [(DomainStatus, &BTreeSet<String>); 5] {
        [
            (DomainStatus::Pending, &self.pending),
            (DomainStatus::Completed, &self.completed),
            (DomainStatus::MarkedForReview, &self.marked_for_review),
            (DomainStatus::ManualReview, &self.manual_review),
            (DomainStatus::Failed, &self.failed),
        ]
    }

    fn bucket_mut(&mut self, status: DomainStatus) -> &mut BTreeSet<String> {
        match status {
            DomainStatus::Completed => &mut self.completed,
            DomainStatus::MarkedForReview => &mut self.marked_for_review,
            DomainStatus::ManualReview => &mut self.manual_review,
            DomainStatus::Failed => &mut self.failed,
            _ => &mut self.pending,
        }
    }

    /// Bucket the domain is in; non-terminal domains report `Pending`
    pub fn status_of(&self, domain: &str) -> Option<DomainStatus> {
        self.buckets()
            .into_iter()
            .find(|(_, bucket)| bucket.contains(domain))
            .map(|(status, _)| status)
    }

    pub fn is_terminal(&self, domain: &str) -> bool {
        self.status_of(domain).is_some_and(|s| s.is_terminal())
    }

    /// Every domain already in a terminal bucket
    pub fn terminal_domains(&self) -> BTreeSet<String> {
        self.completed
            .iter()
            .chain(&self.marked_for_review)
            .chain(&self.manual_review)
            .chain(&self.failed)
            .cloned()
            .collect()
    }

    pub fn domain_count(&self) -> usize {
        self.buckets().iter().map(|(_, b)| b.len()).sum()
    }

    pub fn count(&self, status: DomainStatus) -> usize {
        self.buckets()
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, b)| b.len())
    }

    /// Moves a domain into the bucket for `status`, keeping the partition
    ///
    /// Active statuses map to the pending bucket. Entering a terminal bucket
    /// also clears any resume stage.
    pub fn move_to(&mut self, domain: &str, status: DomainStatus) {
        for bucket in [
            &mut self.pending,
            &mut self.completed,
            &mut self.marked_for_review,
            &mut self.manual_review,
            &mut self.failed,
        ] {
            bucket.remove(domain);
        }
        self.bucket_mut(status).insert(domain.to_string());
        if status.is_terminal() {
            self.resume_stages.remove(domain);
        }
    }

    /// Stage a resumed domain should start at
    pub fn resume_stage(&self, domain: &str) -> DomainStatus {
        self.resume_stages
            .get(domain)
            .copied()
            .unwrap_or(DomainStatus::AssessingSecurity)
    }

    pub fn set_in_flight(&mut self, worker: usize, domain: &str, stage: DomainStatus) {
        let started_at = match self.in_flight.get(&worker) {
            Some(current) if current.domain == domain => current.started_at,
            _ => Utc::now(),
        };
        self.in_flight.insert(
            worker,
            InFlight {
                domain: domain.to_string(),
                stage,
                started_at,
            },
        );
    }

    pub fn clear_in_flight(&mut self, worker: usize) -> Option<InFlight> {
        self.in_flight.remove(&worker)
    }

    /// Aligns the buckets with the current domain list
    ///
    /// Domains new to the list become pending; domains no longer listed are
    /// dropped. Returns `(added, dropped)`.
    pub fn reconcile<'a>(&mut self, domains: impl IntoIterator<Item = &'a str>) -> (usize, usize) {
        let wanted: BTreeSet<String> = domains.into_iter().map(str::to_string).collect();

        let mut dropped = 0;
        for bucket in [
            &mut self.pending,
            &mut self.completed,
            &mut self.marked_for_review,
            &mut self.manual_review,
            &mut self.failed,
        ] {
            let before = bucket.len();
            bucket.retain(|d| wanted.contains(d));
            dropped += before - bucket.len();
        }
        self.resume_stages.retain(|d, _| wanted.contains(d));
        self.in_flight.clear();

        let mut added = 0;
        for domain in &wanted {
            if self.status_of(domain).is_none() {
                self.pending.insert(domain.clone());
                added += 1;
            }
        }
        (added, dropped)
    }

    /// Checks the structural invariants a loaded checkpoint must satisfy
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::Corrupt(format!(
                "schema version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }

        let mut seen = BTreeSet::new();
        for (_, bucket) in self.buckets() {
            for domain in bucket {
                if !seen.insert(domain.as_str()) {
                    return Err(CheckpointError::Corrupt(format!(
                        "domain {} appears in more than one bucket",
                        domain
                    )));
                }
            }
        }

        for (domain, stage) in &self.resume_stages {
            if !self.pending.contains(domain) || stage.is_terminal() {
                return Err(CheckpointError::Corrupt(format!(
                    "resume stage {:?} recorded for non-pending domain {}",
                    stage, domain
                )));
            }
        }

        Ok(())
    }
}
