//! File-backed record store
//!
//! One JSON document per household under a root directory. Writes go to a
//! temporary file that is renamed over the ledger, so a crash mid-write
//! leaves the previous ledger intact.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::domain::{
    BillingRecord, DomainError, DomainResult, HistoryRange, HouseholdId, RecordStore,
};

pub struct JsonFileRecordStore {
    root: PathBuf,
    file_locks: DashMap<HouseholdId, Arc<Mutex<()>>>,
}

impl JsonFileRecordStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> DomainResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| unavailable(&root, "create store directory", e))?;
        debug!(path = %root.display(), "Opened JSON record store");
        Ok(Self {
            root,
            file_locks: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ledger_path(&self, household_id: &HouseholdId) -> PathBuf {
        self.root.join(format!("{}.json", file_stem(household_id)))
    }

    fn file_lock(&self, household_id: &HouseholdId) -> Arc<Mutex<()>> {
        self.file_locks
            .entry(household_id.clone())
            .or_default()
            .clone()
    }

    async fn read_ledger(&self, household_id: &HouseholdId) -> DomainResult<BTreeMap<NaiveDate, BillingRecord>> {
        let path = self.ledger_path(household_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(unavailable(&path, "read ledger", e)),
        };

        let records: Vec<BillingRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            error!(path = %path.display(), error = %e, "Corrupt ledger file");
            DomainError::StoreUnavailable(format!("corrupt ledger file {}: {}", path.display(), e))
        })?;

        Ok(records.into_iter().map(|r| (r.date, r)).collect())
    }

    async fn write_ledger(
        &self,
        household_id: &HouseholdId,
        ledger: &BTreeMap<NaiveDate, BillingRecord>,
    ) -> DomainResult<()> {
        let path = self.ledger_path(household_id);
        let records: Vec<&BillingRecord> = ledger.values().collect();
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| DomainError::StoreUnavailable(format!("serialize ledger: {}", e)))?;

        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, &json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(unavailable(&tmp, "write ledger", e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(unavailable(&path, "replace ledger", e));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn get(&self, household_id: &HouseholdId, date: NaiveDate) -> DomainResult<Option<BillingRecord>> {
        let lock = self.file_lock(household_id);
        let _guard = lock.lock().await;
        Ok(self.read_ledger(household_id).await?.remove(&date))
    }

    async fn upsert(&self, record: BillingRecord) -> DomainResult<()> {
        let household_id = record.household_id.clone();
        let lock = self.file_lock(&household_id);
        let _guard = lock.lock().await;

        let mut ledger = self.read_ledger(&household_id).await?;
        ledger.insert(record.date, record);
        self.write_ledger(&household_id, &ledger).await
    }

    async fn list(&self, household_id: &HouseholdId, range: HistoryRange) -> DomainResult<Vec<BillingRecord>> {
        let lock = self.file_lock(household_id);
        let _guard = lock.lock().await;
        Ok(self
            .read_ledger(household_id)
            .await?
            .into_values()
            .filter(|r| range.contains(r.date))
            .collect())
    }
}

/// Household ids are opaque, so anything outside `[A-Za-z0-9_-]` is
/// hex-escaped to keep file names portable and unambiguous.
fn file_stem(household_id: &HouseholdId) -> String {
    let mut stem = String::with_capacity(household_id.as_str().len());
    for byte in household_id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

fn unavailable(path: &Path, action: &str, err: std::io::Error) -> DomainError {
    error!(path = %path.display(), error = %err, "Record store I/O failure: {}", action);
    DomainError::StoreUnavailable(format!("{} ({}): {}", action, path.display(), err))
}
