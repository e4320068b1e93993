//! Decision cache over persisted security profiles

use crate::security::profile::Escalation;
use crate::security::{FetchOutcome, SecurityProfile, Strategy};
use crate::storage::{ProfileStore, StorageResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ProfileSlot = Arc<Mutex<SecurityProfile>>;

/// Shared decide/record front for every worker
///
/// Each domain has its own slot lock; a `record` holds it across the update
/// and the store write, so concurrent updates for one domain serialize while
/// different domains proceed independently.
pub struct DecisionCache {
    store: Arc<dyn ProfileStore>,
    min_confidence: u32,
    slots: Mutex<HashMap<String, ProfileSlot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DecisionCache {
    pub fn new(store: Arc<dyn ProfileStore>, min_confidence: u32) -> Self {
        Self {
            store,
            min_confidence,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, domain: &str) -> StorageResult<ProfileSlot> {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get(domain) {
            return Ok(Arc::clone(slot));
        }

        let profile = self
            .store
            .load_profile(domain)?
            .unwrap_or_else(|| SecurityProfile::new(domain));
        let slot = Arc::new(Mutex::new(profile));
        slots.insert(domain.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Strategy for the next fetch against `domain`
    pub fn decide(&self, domain: &str) -> StorageResult<Strategy> {
        let slot = self.slot(domain)?;
        let profile = lock(&slot);
        Ok(profile.decide(self.min_confidence))
    }

    /// Records one outcome and persists the amended profile
    pub fn record(
        &self,
        domain: &str,
        strategy: Strategy,
        outcome: FetchOutcome,
        note: Option<String>,
    ) -> StorageResult<Escalation> {
        let slot = self.slot(domain)?;
        let mut profile = lock(&slot);
        let escalation = profile.record(strategy, outcome, note, Utc::now());
        self.store.save_profile(&profile)?;

        match escalation {
            Escalation::Escalated { from, to } => {
                tracing::info!(domain, %from, %to, %outcome, "Escalated fetch strategy");
            }
            Escalation::Exhausted => {
                tracing::warn!(domain, %strategy, %outcome, "No fetch strategy left");
            }
            Escalation::Unchanged => {}
        }
        Ok(escalation)
    }

    /// Current profile for a domain, if one exists
    pub fn snapshot(&self, domain: &str) -> StorageResult<Option<SecurityProfile>> {
        if let Some(slot) = lock(&self.slots).get(domain).cloned() {
            return Ok(Some(lock(&slot).clone()));
        }
        self.store.load_profile(domain)
    }

    /// Every persisted profile
    pub fn profiles(&self) -> StorageResult<Vec<SecurityProfile>> {
        self.store.list_profiles()
    }
}
