//! In-memory storage backend
//!
//! Backs the integration tests. Record writes can be made to fail on demand
//! to exercise persistence-failure handling.

use crate::security::SecurityProfile;
use crate::storage::traits::{ProfileStore, RecordSink, StorageError, StorageResult};
use crate::storage::{DownloadCandidate, ExtractedRecord};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct MemoryStorage {
    profiles: Mutex<BTreeMap<String, SecurityProfile>>,
    records: Mutex<Vec<ExtractedRecord>>,
    downloads: Mutex<Vec<DownloadCandidate>>,
    failing_domains: Mutex<HashSet<String>>,
    fail_all_records: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent record write fail
    pub fn fail_records(&self, fail: bool) {
        self.fail_all_records.store(fail, Ordering::SeqCst);
    }

    /// Makes record writes for one domain fail
    pub fn fail_records_for(&self, domain: &str) {
        lock(&self.failing_domains).insert(domain.to_string());
    }

    pub fn records(&self) -> Vec<ExtractedRecord> {
        lock(&self.records).clone()
    }

    pub fn records_for(&self, domain: &str) -> Vec<ExtractedRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.domain == domain)
            .cloned()
            .collect()
    }

    pub fn downloads(&self) -> Vec<DownloadCandidate> {
        lock(&self.downloads).clone()
    }
}

impl ProfileStore for MemoryStorage {
    fn load_profile(&self, domain: &str) -> StorageResult<Option<SecurityProfile>> {
        Ok(lock(&self.profiles).get(domain).cloned())
    }

    fn save_profile(&self, profile: &SecurityProfile) -> StorageResult<()> {
        lock(&self.profiles).insert(profile.domain.clone(), profile.clone());
        Ok(())
    }

    fn list_profiles(&self) -> StorageResult<Vec<SecurityProfile>> {
        Ok(lock(&self.profiles).values().cloned().collect())
    }
}

impl RecordSink for MemoryStorage {
    fn append_record(&self, record: &ExtractedRecord) -> StorageResult<()> {
        if self.fail_all_records.load(Ordering::SeqCst)
            || lock(&self.failing_domains).contains(&record.domain)
        {
            return Err(StorageError::Rejected(format!(
                "write refused for {}",
                record.url
            )));
        }
        let mut records = lock(&self.records);
        if !records
            .iter()
            .any(|r| r.domain == record.domain && r.url == record.url)
        {
            records.push(record.clone());
        }
        Ok(())
    }

    fn append_download(&self, candidate: &DownloadCandidate) -> StorageResult<()> {
        let mut downloads = lock(&self.downloads);
        if !downloads
            .iter()
            .any(|d| d.domain == candidate.domain && d.url == candidate.url)
        {
            downloads.push(candidate.clone());
        }
        Ok(())
    }
}
