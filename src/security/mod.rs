//! Security and proxy decision cache
//!
//! Each domain carries a persisted `SecurityProfile`: the track record of the
//! three fetch strategies on that domain plus an escalation level that only
//! rises. The `DecisionCache` turns that history into the strategy for the
//! next fetch and folds every outcome back in.

mod cache;
mod profile;
mod strategy;

pub use cache::DecisionCache;
pub use profile::{Escalation, SecurityProfile, StrategyStats};
pub use strategy::{FetchOutcome, Strategy};

use sha2::{Digest, Sha256};

/// Stable fingerprint of a challenge response (status plus body)
pub fn challenge_fingerprint(status: u16, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(status.to_be_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
