//! SQLite storage implementation

use crate::security::SecurityProfile;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProfileStore, RecordSink, StorageResult};
use crate::storage::{DownloadCandidate, ExtractedRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite storage backend
///
/// The connection sits behind a mutex so one instance can serve every
/// worker; each call holds the lock only for its own statements.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database file and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Run Bookkeeping =====

    pub fn begin_run(&self, run_id: &str, config_hash: &str) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO runs (run_id, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                Utc::now().to_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, status: RunStatus) -> StorageResult<()> {
        self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE run_id = ?3",
            params![status.to_db_string(), Utc::now().to_rfc3339(), run_id],
        )?;
        Ok(())
    }

    pub fn run_status(&self, run_id: &str) -> StorageResult<Option<RunStatus>> {
        let status: Option<String> = self
            .conn()
            .query_row(
                "SELECT status FROM runs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.and_then(|s| RunStatus::from_db_string(&s)))
    }
}

impl ProfileStore for SqliteStorage {
    fn load_profile(&self, domain: &str) -> StorageResult<Option<SecurityProfile>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT profile_json FROM security_profiles WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_profile(&self, profile: &SecurityProfile) -> StorageResult<()> {
        let json = serde_json::to_string(profile)?;
        self.conn().execute(
            "INSERT INTO security_profiles (domain, strategy, escalation, profile_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(domain) DO UPDATE SET
                strategy = excluded.strategy,
                escalation = excluded.escalation,
                profile_json = excluded.profile_json,
                updated_at = excluded.updated_at",
            params![
                profile.domain,
                profile.strategy.to_db_string(),
                profile.escalation.to_db_string(),
                json,
                profile.updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn list_profiles(&self) -> StorageResult<Vec<SecurityProfile>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT profile_json FROM security_profiles ORDER BY domain")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut profiles = Vec::new();
        for json in rows {
            profiles.push(serde_json::from_str(&json?)?);
        }
        Ok(profiles)
    }
}

impl RecordSink for SqliteStorage {
    fn append_record(&self, record: &ExtractedRecord) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO extracted_records
                (domain, url, strategy, stage, title, text, raw_length, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.domain,
                record.url,
                record.strategy.to_db_string(),
                record.stage.to_db_string(),
                record.title,
                record.text,
                record.raw_length as i64,
                record.extracted_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn append_download(&self, candidate: &DownloadCandidate) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO download_candidates (domain, url, referrer, discovered_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                candidate.domain,
                candidate.url,
                candidate.referrer,
                candidate.discovered_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}
