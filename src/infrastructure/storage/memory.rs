//! In-memory record store

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use crate::domain::{BillingRecord, DomainResult, HistoryRange, HouseholdId, RecordStore};

/// In-memory store for development and testing
///
/// One date-ordered map per household, so listing is already sorted.
pub struct InMemoryRecordStore {
    ledgers: DashMap<HouseholdId, BTreeMap<NaiveDate, BillingRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            ledgers: DashMap::new(),
        }
    }

    /// Seed the store with existing records (e.g. an imported payment history).
    pub fn with_records(records: impl IntoIterator<Item = BillingRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store
                .ledgers
                .entry(record.household_id.clone())
                .or_default()
                .insert(record.date, record);
        }
        store
    }

    /// Number of households with at least one record
    pub fn household_count(&self) -> usize {
        self.ledgers.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, household_id: &HouseholdId, date: NaiveDate) -> DomainResult<Option<BillingRecord>> {
        Ok(self
            .ledgers
            .get(household_id)
            .and_then(|ledger| ledger.get(&date).cloned()))
    }

    async fn upsert(&self, record: BillingRecord) -> DomainResult<()> {
        self.ledgers
            .entry(record.household_id.clone())
            .or_default()
            .insert(record.date, record);
        Ok(())
    }

    async fn list(&self, household_id: &HouseholdId, range: HistoryRange) -> DomainResult<Vec<BillingRecord>> {
        Ok(self
            .ledgers
            .get(household_id)
            .map(|ledger| {
                ledger
                    .values()
                    .filter(|r| range.contains(r.date))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn latest(&self, household_id: &HouseholdId) -> DomainResult<Option<BillingRecord>> {
        Ok(self
            .ledgers
            .get(household_id)
            .and_then(|ledger| ledger.values().next_back().cloned()))
    }
}
