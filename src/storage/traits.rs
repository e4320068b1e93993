//! Storage traits and error types
//!
//! The orchestrator sees storage through two narrow seams: the profile store
//! backing the decision cache, and the append-only record sink. Both are
//! shared by every worker, so implementations must be `Send + Sync`.

use crate::security::SecurityProfile;
use crate::storage::{DownloadCandidate, ExtractedRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Sink rejected write: {0}")]
    Rejected(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of the per-domain security profiles
pub trait ProfileStore: Send + Sync {
    fn load_profile(&self, domain: &str) -> StorageResult<Option<SecurityProfile>>;

    /// Inserts or replaces the profile for `profile.domain`
    fn save_profile(&self, profile: &SecurityProfile) -> StorageResult<()>;

    /// All stored profiles, ordered by domain
    fn list_profiles(&self) -> StorageResult<Vec<SecurityProfile>>;
}

/// Append-only destination for extracted data
pub trait RecordSink: Send + Sync {
    /// Stores one page; a URL already stored for the domain is kept as is,
    /// so a resumed walk can revisit pages
    fn append_record(&self, record: &ExtractedRecord) -> StorageResult<()>;

    /// In-scope file links found during the walk; never fetched by the walk
    fn append_download(&self, candidate: &DownloadCandidate) -> StorageResult<()>;
}
