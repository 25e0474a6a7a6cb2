//! Record store interface

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{BillingRecord, HistoryRange};
use crate::domain::{DomainResult, HouseholdId};

/// Persistence boundary for household ledgers.
///
/// Implementations key records by `(household_id, date)`; `upsert` must be
/// atomic per record. Outages are reported as `DomainError::StoreUnavailable`.
///
/// Reads are time-boxed by the ledger. Writes are awaited to completion, so a
/// store that can stall must enforce its own write deadline and only report
/// failure when nothing was saved.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, household_id: &HouseholdId, date: NaiveDate) -> DomainResult<Option<BillingRecord>>;

    /// Insert or replace the record stored under its `(household_id, date)`.
    async fn upsert(&self, record: BillingRecord) -> DomainResult<()>;

    /// Records inside `range`, ascending by date.
    async fn list(&self, household_id: &HouseholdId, range: HistoryRange) -> DomainResult<Vec<BillingRecord>>;

    /// Most recent record of a household.
    async fn latest(&self, household_id: &HouseholdId) -> DomainResult<Option<BillingRecord>> {
        Ok(self.list(household_id, HistoryRange::all()).await?.pop())
    }
}
