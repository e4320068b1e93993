//! Checkpoint store
//!
//! Durable, staleness-bounded snapshot of batch progress. The scheduler is
//! its only writer.

mod store;
mod types;

pub use store::CheckpointStore;
pub use types::{generate_run_id, Checkpoint, CheckpointStats, InFlight, SCHEMA_VERSION};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint corrupt: {0}")]
    Corrupt(String),
}
