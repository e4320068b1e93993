//! Storage module for persisting crawl output and security profiles
//!
//! - SQLite backend with schema management (`SqliteStorage`)
//! - In-memory backend for tests (`MemoryStorage`)
//! - Record types written by the domain pipeline
//! - Run bookkeeping for the `runs` table

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;
pub use traits::{ProfileStore, RecordSink, StorageError, StorageResult};

use crate::security::Strategy;
use crate::state::DomainStatus;
use chrono::{DateTime, Utc};

use std::path::Path;

/// Opens (or creates) the SQLite database at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One extracted page, with the metadata needed to audit it later
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub domain: String,
    pub url: String,
    pub strategy: Strategy,

    /// `QualityTesting` for sample evidence, `FullScraping` otherwise
    pub stage: DomainStatus,

    pub title: Option<String>,
    pub text: String,

    /// Length of the raw document the text came from
    pub raw_length: usize,

    pub extracted_at: DateTime<Utc>,
}

/// A downloadable file discovered on an in-scope page
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadCandidate {
    pub domain: String,
    pub url: String,
    pub referrer: String,
    pub discovered_at: DateTime<Utc>,
}

/// Status of a batch run in the `runs` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}
