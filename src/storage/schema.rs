//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per batch run
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Learned fetch strategy per domain, kept across runs
CREATE TABLE IF NOT EXISTS security_profiles (
    domain TEXT PRIMARY KEY,
    strategy TEXT NOT NULL,
    escalation TEXT NOT NULL,
    profile_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Extracted page records, sample evidence included
CREATE TABLE IF NOT EXISTS extracted_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    url TEXT NOT NULL,
    strategy TEXT NOT NULL,
    stage TEXT NOT NULL,
    title TEXT,
    text TEXT NOT NULL,
    raw_length INTEGER NOT NULL,
    extracted_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_records_domain_url ON extracted_records(domain, url);
CREATE INDEX IF NOT EXISTS idx_records_stage ON extracted_records(stage);

-- Downloadable files found during the walk
CREATE TABLE IF NOT EXISTS download_candidates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    url TEXT NOT NULL,
    referrer TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    UNIQUE(domain, url)
);
"#;

pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
