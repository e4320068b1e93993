use crate::security::{FetchOutcome, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cumulative track record of one strategy on one domain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub successes: u64,

    /// Failure signatures only; transient errors are counted apart
    pub failures: u64,

    pub transient_errors: u64,

    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl StrategyStats {
    /// Attempts that say something about the strategy's viability
    pub fn attempts(&self) -> u64 {
        self.successes + self.failures
    }

    pub fn success_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            n => self.successes as f64 / n as f64,
        }
    }
}

/// What a recorded outcome did to the escalation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Unchanged,
    Escalated { from: Strategy, to: Strategy },
    /// A failure signature at the most capable strategy, with no success
    /// on record for any strategy
    Exhausted,
}

/// Persisted per-domain security record
///
/// Counters and notes only ever grow; the escalation level only ever rises.
/// Below `ProxyWithBrowser` the level is a fallback for strategies without
/// enough history, so a confident track record outranks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub domain: String,

    /// Strategy used by the most recent attempt
    pub strategy: Strategy,

    /// Strategy returned while no candidate is confident
    pub escalation: Strategy,

    pub stats: BTreeMap<Strategy, StrategyStats>,

    /// Free-text evidence (challenge fingerprints, escalation reasons)
    pub notes: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecurityProfile {
    pub fn new(domain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            domain: domain.into(),
            strategy: Strategy::Direct,
            escalation: Strategy::Direct,
            stats: BTreeMap::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stats_for(&self, strategy: Strategy) -> StrategyStats {
        self.stats.get(&strategy).cloned().unwrap_or_default()
    }

    /// Whether any strategy has ever fetched a page of this domain
    pub fn has_succeeded(&self) -> bool {
        self.stats.values().any(|s| s.successes > 0)
    }

    /// Every strategy tried, the last one failed, and none ever succeeded
    pub fn is_exhausted(&self) -> bool {
        self.escalation == Strategy::ProxyWithBrowser && !self.has_succeeded()
    }

    /// Picks the strategy for the next fetch
    ///
    /// Among strategies whose attempt count reaches `min_confidence`, the best
    /// non-zero success rate wins, ties going to the cheaper strategy. Without
    /// such a candidate the escalation level is returned. Once the level has
    /// reached `ProxyWithBrowser` nothing cheaper is returned again.
    pub fn decide(&self, min_confidence: u32) -> Strategy {
        if self.escalation == Strategy::ProxyWithBrowser {
            return Strategy::ProxyWithBrowser;
        }

        let mut best: Option<(Strategy, f64)> = None;
        for strategy in Strategy::ALL {
            let Some(stats) = self.stats.get(&strategy) else {
                continue;
            };
            if stats.attempts() < u64::from(min_confidence) {
                continue;
            }
            let rate = stats.success_rate();
            if rate > 0.0 && best.map_or(true, |(_, best_rate)| rate > best_rate) {
                best = Some((strategy, rate));
            }
        }

        best.map_or(self.escalation, |(strategy, _)| strategy)
    }

    /// Folds one fetch outcome into the record
    pub fn record(
        &mut self,
        strategy: Strategy,
        outcome: FetchOutcome,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Escalation {
        let stats = self.stats.entry(strategy).or_default();
        stats.last_attempt_at = Some(now);
        match outcome {
            FetchOutcome::Success => {
                stats.successes += 1;
                stats.last_success_at = Some(now);
            }
            FetchOutcome::RetryableError => stats.transient_errors += 1,
            _ => {
                stats.failures += 1;
                stats.last_failure_at = Some(now);
            }
        }

        self.strategy = strategy;
        self.updated_at = now;
        if let Some(note) = note {
            self.notes.push(note);
        }

        if !outcome.is_failure_signature() {
            return Escalation::Unchanged;
        }

        match strategy.escalate() {
            None if self.has_succeeded() => Escalation::Unchanged,
            None => Escalation::Exhausted,
            Some(next) if next > self.escalation => {
                let from = self.escalation;
                self.escalation = next;
                self.notes.push(format!(
                    "{} escalated {} -> {} after {}",
                    now.to_rfc3339(),
                    from,
                    next,
                    outcome
                ));
                Escalation::Escalated { from, to: next }
            }
            Some(_) => Escalation::Unchanged,
        }
    }
}
