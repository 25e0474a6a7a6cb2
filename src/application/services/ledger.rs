//! Ledger service: per-household billing history and payments

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::policy::quantity_from_f64;
use crate::domain::{
    BillingPolicy, BillingRecord, BillingStatus, BillingSummary, ConsumptionReading, DomainError,
    DomainResult, History, HistoryRange, HouseholdId, PolicyEvaluator, RecordStore,
};
use crate::notifications::{create_event_bus, Event, EventSubscriber, RecordEvent, SharedEventBus};

/// Default upper bound for a single record-store read.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns every household ledger.
///
/// Writes to one household are serialized through that household's lock;
/// reads share it. Households never contend with each other.
pub struct LedgerService {
    store: Arc<dyn RecordStore>,
    locks: DashMap<HouseholdId, Arc<RwLock<()>>>,
    event_bus: SharedEventBus,
    store_timeout: Duration,
}

impl LedgerService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            event_bus: create_event_bus(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Publish ledger events on a bus shared with other components.
    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.event_bus.subscribe()
    }

    /// Bill one metered day.
    ///
    /// An existing record for the same day is rejected with `DuplicateRecord`
    /// unless `overwrite` is set; even then a paid record stays untouched
    /// (`RecordLocked`).
    pub async fn record_day(
        &self,
        household_id: &HouseholdId,
        date: NaiveDate,
        consumption_kwh: f64,
        policy: &BillingPolicy,
        overwrite: bool,
    ) -> DomainResult<BillingRecord> {
        self.try_record_day(household_id, date, consumption_kwh, policy, overwrite)
            .await
            .map_err(|e| rejected("record_day", household_id, date, e))
    }

    /// Bill a reading delivered by the metering source.
    pub async fn record_reading(
        &self,
        reading: &ConsumptionReading,
        policy: &BillingPolicy,
        overwrite: bool,
    ) -> DomainResult<BillingRecord> {
        self.record_day(
            &reading.household_id,
            reading.date,
            reading.consumption_kwh,
            policy,
            overwrite,
        )
        .await
    }

    async fn try_record_day(
        &self,
        household_id: &HouseholdId,
        date: NaiveDate,
        consumption_kwh: f64,
        policy: &BillingPolicy,
        overwrite: bool,
    ) -> DomainResult<BillingRecord> {
        household_id.validate()?;
        let consumption = quantity_from_f64(consumption_kwh, "consumption_kwh")?;
        let evaluation = PolicyEvaluator::evaluate_decimal(consumption, policy)?;

        let lock = self.household_lock(household_id);
        let _guard = lock.write().await;

        let replaced = match self.bounded(self.store.get(household_id, date)).await? {
            Some(_) if !overwrite => {
                return Err(DomainError::DuplicateRecord {
                    household_id: household_id.clone(),
                    date,
                });
            }
            Some(existing) => {
                existing.ensure_replaceable()?;
                true
            }
            None => false,
        };

        let record = BillingRecord::new(
            household_id.clone(),
            date,
            consumption,
            evaluation,
            policy.clone(),
        );
        self.store.upsert(record.clone()).await?;

        metrics::counter!("billing_records_total", "status" => record.status.as_str()).increment(1);
        info!(
            household_id = %household_id,
            %date,
            consumption_kwh = %record.consumption_kwh,
            excess_kwh = %record.excess_kwh,
            amount_due = %record.amount_due,
            status = %record.status,
            replaced,
            "Billing record stored"
        );

        let event = RecordEvent::from(&record);
        self.event_bus.publish(if replaced {
            Event::RecordReplaced(event)
        } else {
            Event::RecordCreated(event)
        });

        Ok(record)
    }

    /// Settle an unpaid record.
    pub async fn mark_paid(&self, household_id: &HouseholdId, date: NaiveDate) -> DomainResult<BillingRecord> {
        self.try_mark_paid(household_id, date)
            .await
            .map_err(|e| rejected("mark_paid", household_id, date, e))
    }

    async fn try_mark_paid(&self, household_id: &HouseholdId, date: NaiveDate) -> DomainResult<BillingRecord> {
        let lock = self.household_lock(household_id);
        let _guard = lock.write().await;

        let mut record = self
            .bounded(self.store.get(household_id, date))
            .await?
            .ok_or_else(|| DomainError::NotFound {
                household_id: household_id.clone(),
                date,
            })?;

        record.mark_paid(Utc::now())?;
        self.store.upsert(record.clone()).await?;

        metrics::counter!("billing_payments_total").increment(1);
        info!(
            household_id = %household_id,
            %date,
            amount = %record.amount_due,
            "Billing record paid"
        );
        self.event_bus.publish(Event::RecordPaid(RecordEvent::from(&record)));

        Ok(record)
    }

    /// Records dated inside `range`, oldest first.
    pub async fn history(&self, household_id: &HouseholdId, range: HistoryRange) -> DomainResult<History> {
        range.validate()?;
        let lock = self.household_lock(household_id);
        let _guard = lock.read().await;
        let mut records = self.bounded(self.store.list(household_id, range)).await?;
        records.sort_by_key(|r| r.date);
        if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DomainError::StoreUnavailable(format!(
                "record store returned two records for household {} on {}",
                household_id, pair[0].date
            )));
        }
        Ok(History::new(records))
    }

    /// Sum of all unpaid amounts; zero when nothing is owed.
    pub async fn current_balance(&self, household_id: &HouseholdId) -> DomainResult<Decimal> {
        let history = self.history(household_id, HistoryRange::all()).await?;
        Ok(outstanding(&history))
    }

    /// Most recent record, if the household has any.
    pub async fn latest_reading(&self, household_id: &HouseholdId) -> DomainResult<Option<BillingRecord>> {
        let lock = self.household_lock(household_id);
        let _guard = lock.read().await;
        self.bounded(self.store.latest(household_id)).await
    }

    /// Everything the "Payment Due" card shows, read from one snapshot.
    pub async fn summary(&self, household_id: &HouseholdId) -> DomainResult<BillingSummary> {
        let history = self.history(household_id, HistoryRange::all()).await?;
        let balance = outstanding(&history);
        let unpaid_records = history.iter().filter(|r| r.is_outstanding()).count();

        Ok(BillingSummary {
            household_id: household_id.clone(),
            latest: history.last().cloned(),
            balance,
            unpaid_records,
            payment_due: balance > Decimal::ZERO,
        })
    }

    fn household_lock(&self, household_id: &HouseholdId) -> Arc<RwLock<()>> {
        self.locks.entry(household_id.clone()).or_default().clone()
    }

    /// Run a store read under the configured timeout.
    ///
    /// Writes are never cut short here: dropping an `upsert` mid-flight could
    /// leave a saved record behind a reported failure. Write deadlines belong
    /// to the store, which must fail atomically.
    async fn bounded<T>(&self, call: impl Future<Output = DomainResult<T>>) -> DomainResult<T> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::StoreUnavailable(format!(
                "record store did not respond within {} ms",
                self.store_timeout.as_millis()
            ))),
        }
    }
}

fn outstanding(history: &History) -> Decimal {
    history
        .iter()
        .filter(|r| r.status == BillingStatus::Unpaid)
        .map(|r| r.amount_due)
        .sum()
}

fn rejected(operation: &'static str, household_id: &HouseholdId, date: NaiveDate, err: DomainError) -> DomainError {
    metrics::counter!("billing_rejections_total", "operation" => operation, "reason" => err.reason())
        .increment(1);
    warn!(operation, household_id = %household_id, %date, error = %err, "Ledger operation rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryRecordStore;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn billing_page_policy() -> BillingPolicy {
        BillingPolicy::from_f64(25.0, 5.0, 8.5).unwrap()
    }

    fn service() -> LedgerService {
        LedgerService::new(Arc::new(InMemoryRecordStore::new()))
    }

    /// Store that can be switched into an outage or made to hang.
    struct FlakyStore {
        inner: InMemoryRecordStore,
        fail_writes: AtomicBool,
        hang: AtomicBool,
        /// Saves the record, then acknowledges after this many milliseconds
        late_ack_ms: AtomicU64,
        /// Lists every record twice
        duplicate_listing: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryRecordStore::new(),
                fail_writes: AtomicBool::new(false),
                hang: AtomicBool::new(false),
                late_ack_ms: AtomicU64::new(0),
                duplicate_listing: AtomicBool::new(false),
            }
        }

        async fn maybe_hang(&self) {
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn get(&self, household_id: &HouseholdId, date: NaiveDate) -> DomainResult<Option<BillingRecord>> {
            self.maybe_hang().await;
            self.inner.get(household_id, date).await
        }

        async fn upsert(&self, record: BillingRecord) -> DomainResult<()> {
            self.maybe_hang().await;
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(DomainError::StoreUnavailable("disk full".into()));
            }
            self.inner.upsert(record).await?;
            let delay = self.late_ack_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(())
        }

        async fn list(&self, household_id: &HouseholdId, range: HistoryRange) -> DomainResult<Vec<BillingRecord>> {
            self.maybe_hang().await;
            let records = self.inner.list(household_id, range).await?;
            if self.duplicate_listing.load(Ordering::SeqCst) {
                return Ok(records.iter().chain(records.iter()).cloned().collect());
            }
            Ok(records)
        }
    }

    #[tokio::test]
    async fn excess_usage_creates_unpaid_record() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let record = ledger
            .record_day(&house, date(2024, 9, 10), 30.2, &billing_page_policy(), false)
            .await
            .unwrap();

        assert_eq!(record.excess_kwh, d("0.2"));
        assert_eq!(record.amount_due, d("1.70"));
        assert_eq!(record.status, BillingStatus::Unpaid);
        assert_eq!(record.policy, billing_page_policy());
        assert!(record.paid_at.is_none());
    }

    #[tokio::test]
    async fn usage_within_tolerance_creates_no_charge_record() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let record = ledger
            .record_day(&house, date(2024, 9, 5), 22.1, &billing_page_policy(), false)
            .await
            .unwrap();

        assert_eq!(record.excess_kwh, Decimal::ZERO);
        assert_eq!(record.amount_due, d("0.00"));
        assert_eq!(record.status, BillingStatus::NoCharge);
        assert_eq!(ledger.current_balance(&house).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn paying_twice_is_an_invalid_transition() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);
        // 34.55 kWh against a 30 kWh threshold at 10/kWh -> 45.50
        let policy = BillingPolicy::from_f64(25.0, 5.0, 10.0).unwrap();
        let record = ledger.record_day(&house, day, 34.55, &policy, false).await.unwrap();
        assert_eq!(record.amount_due, d("45.50"));

        let paid = ledger.mark_paid(&house, day).await.unwrap();
        assert_eq!(paid.status, BillingStatus::Paid);
        assert!(paid.paid_at.is_some());

        let err = ledger.mark_paid(&house, day).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: BillingStatus::Paid,
                to: BillingStatus::Paid
            }
        );

        let stored = ledger.latest_reading(&house).await.unwrap().unwrap();
        assert_eq!(stored.paid_at, paid.paid_at);
    }

    #[tokio::test]
    async fn duplicate_day_is_rejected_without_mutation() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);
        let first = ledger
            .record_day(&house, day, 30.2, &billing_page_policy(), false)
            .await
            .unwrap();

        let err = ledger
            .record_day(&house, day, 40.0, &billing_page_policy(), false)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::DuplicateRecord {
                household_id: house.clone(),
                date: day
            }
        );

        let history = ledger.history(&house, HistoryRange::all()).await.unwrap();
        assert_eq!(history.to_vec(), vec![first]);
    }

    #[tokio::test]
    async fn balance_counts_only_unpaid_records() {
        let ledger = service();
        let house = HouseholdId::from(7u32);

        // 33.45 kWh at 5/kWh above 30 -> 17.25
        let cheap = BillingPolicy::from_f64(25.0, 5.0, 5.0).unwrap();
        ledger
            .record_day(&house, date(2024, 8, 28), 33.45, &cheap, false)
            .await
            .unwrap();

        let pricey = BillingPolicy::from_f64(25.0, 5.0, 10.0).unwrap();
        ledger
            .record_day(&house, date(2024, 9, 10), 34.55, &pricey, false)
            .await
            .unwrap();
        ledger.mark_paid(&house, date(2024, 9, 10)).await.unwrap();

        assert_eq!(ledger.current_balance(&house).await.unwrap(), d("17.25"));
    }

    #[tokio::test]
    async fn overwrite_replaces_unpaid_and_no_charge_records() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let policy = billing_page_policy();

        ledger.record_day(&house, date(2024, 9, 1), 30.2, &policy, false).await.unwrap();
        let replaced = ledger
            .record_day(&house, date(2024, 9, 1), 22.1, &policy, true)
            .await
            .unwrap();
        assert_eq!(replaced.status, BillingStatus::NoCharge);

        let replaced_again = ledger
            .record_day(&house, date(2024, 9, 1), 32.0, &policy, true)
            .await
            .unwrap();
        assert_eq!(replaced_again.amount_due, d("17.00"));

        let history = ledger.history(&house, HistoryRange::all()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(ledger.current_balance(&house).await.unwrap(), d("17.00"));
    }

    #[tokio::test]
    async fn paid_record_is_locked_against_overwrite() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);
        let policy = billing_page_policy();

        ledger.record_day(&house, day, 30.2, &policy, false).await.unwrap();
        let paid = ledger.mark_paid(&house, day).await.unwrap();

        let err = ledger.record_day(&house, day, 50.0, &policy, true).await.unwrap_err();
        assert!(matches!(err, DomainError::RecordLocked { .. }));
        assert_eq!(ledger.latest_reading(&house).await.unwrap(), Some(paid));
    }

    #[tokio::test]
    async fn paying_unknown_or_free_days_fails() {
        let ledger = service();
        let house = HouseholdId::from(7u32);

        let err = ledger.mark_paid(&house, date(2024, 9, 10)).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        ledger
            .record_day(&house, date(2024, 9, 5), 22.1, &billing_page_policy(), false)
            .await
            .unwrap();
        let err = ledger.mark_paid(&house, date(2024, 9, 5)).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: BillingStatus::NoCharge,
                to: BillingStatus::Paid
            }
        );
    }

    #[tokio::test]
    async fn invalid_readings_are_rejected_before_touching_the_store() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let policy = billing_page_policy();

        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let err = ledger
                .record_day(&house, date(2024, 9, 10), bad, &policy, false)
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidInput(_)));
        }
        let blank = HouseholdId::from("  ");
        assert!(matches!(
            ledger.record_day(&blank, date(2024, 9, 10), 1.0, &policy, false).await,
            Err(DomainError::InvalidInput(_))
        ));
        assert!(ledger.latest_reading(&house).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_ordered_and_filtered() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let policy = billing_page_policy();

        for (day, kwh) in [(28, 27.8), (20, 24.5), (10, 30.2), (5, 22.1)] {
            let month = if day >= 20 { 8 } else { 9 };
            ledger
                .record_day(&house, date(2024, month, day), kwh, &policy, false)
                .await
                .unwrap();
        }

        let history = ledger.history(&house, HistoryRange::all()).await.unwrap();
        let dates: Vec<_> = history.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 8, 20),
                date(2024, 8, 28),
                date(2024, 9, 5),
                date(2024, 9, 10)
            ]
        );
        assert!(dates.windows(2).all(|w| w[0] < w[1]));

        let september = ledger
            .history(&house, HistoryRange::all().since(date(2024, 9, 1)))
            .await
            .unwrap();
        assert_eq!(september.len(), 2);

        let window = ledger
            .history(&house, HistoryRange::between(date(2024, 8, 28), date(2024, 9, 5)))
            .await
            .unwrap();
        assert_eq!(window.first().map(|r| r.date), Some(date(2024, 8, 28)));
        assert_eq!(window.last().map(|r| r.date), Some(date(2024, 9, 5)));

        let inverted = ledger
            .history(&house, HistoryRange::between(date(2024, 9, 5), date(2024, 8, 28)))
            .await;
        assert!(matches!(inverted, Err(DomainError::InvalidInput(_))));

        assert_eq!(
            ledger.latest_reading(&house).await.unwrap().map(|r| r.date),
            Some(date(2024, 9, 10))
        );
    }

    #[tokio::test]
    async fn unknown_household_has_empty_ledger() {
        let ledger = service();
        let house = HouseholdId::from("nobody");
        assert!(ledger.latest_reading(&house).await.unwrap().is_none());
        assert_eq!(ledger.current_balance(&house).await.unwrap(), Decimal::ZERO);
        assert!(ledger.history(&house, HistoryRange::all()).await.unwrap().is_empty());

        let summary = ledger.summary(&house).await.unwrap();
        assert!(!summary.payment_due);
        assert!(summary.latest.is_none());
    }

    #[tokio::test]
    async fn summary_reports_payment_due() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        let policy = billing_page_policy();
        ledger.record_day(&house, date(2024, 9, 9), 31.0, &policy, false).await.unwrap();
        ledger.record_day(&house, date(2024, 9, 10), 30.2, &policy, false).await.unwrap();

        let summary = ledger.summary(&house).await.unwrap();
        assert!(summary.payment_due);
        assert_eq!(summary.unpaid_records, 2);
        assert_eq!(summary.balance, d("10.20"));
        assert_eq!(summary.latest.map(|r| r.date), Some(date(2024, 9, 10)));
    }

    #[tokio::test]
    async fn policy_change_does_not_touch_past_records() {
        let ledger = service();
        let house = HouseholdId::from(7u32);
        ledger
            .record_day(&house, date(2024, 9, 9), 31.0, &billing_page_policy(), false)
            .await
            .unwrap();

        let stricter = BillingPolicy::from_f64(20.0, 0.0, 20.0).unwrap();
        ledger
            .record_day(&house, date(2024, 9, 10), 31.0, &stricter, false)
            .await
            .unwrap();

        let history = ledger.history(&house, HistoryRange::all()).await.unwrap();
        assert_eq!(history.first().map(|r| r.amount_due), Some(d("8.50")));
        assert_eq!(history.last().map(|r| r.amount_due), Some(d("220.00")));
    }

    #[tokio::test]
    async fn store_outage_leaves_ledger_unchanged() {
        let store = Arc::new(FlakyStore::new());
        let ledger = LedgerService::new(store.clone());
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);
        let policy = billing_page_policy();

        ledger.record_day(&house, day, 30.2, &policy, false).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = ledger.mark_paid(&house, day).await.unwrap_err();
        assert!(err.is_transient());
        let err = ledger
            .record_day(&house, date(2024, 9, 11), 40.0, &policy, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StoreUnavailable(_)));

        store.fail_writes.store(false, Ordering::SeqCst);
        let history = ledger.history(&house, HistoryRange::all()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.first().map(|r| r.status), Some(BillingStatus::Unpaid));

        // Retrying after the outage succeeds
        assert_eq!(
            ledger.mark_paid(&house, day).await.unwrap().status,
            BillingStatus::Paid
        );
    }

    #[tokio::test]
    async fn hanging_store_times_out() {
        let store = Arc::new(FlakyStore::new());
        store.hang.store(true, Ordering::SeqCst);
        let ledger = LedgerService::new(store).with_store_timeout(Duration::from_millis(20));
        let house = HouseholdId::from(7u32);

        let err = ledger
            .record_day(&house, date(2024, 9, 10), 30.2, &billing_page_policy(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StoreUnavailable(_)));
        assert!(ledger.current_balance(&house).await.is_err());
    }

    #[tokio::test]
    async fn slow_write_acknowledgement_is_not_reported_as_failure() {
        let store = Arc::new(FlakyStore::new());
        store.late_ack_ms.store(200, Ordering::SeqCst);
        let ledger = LedgerService::new(store.clone()).with_store_timeout(Duration::from_millis(20));
        let mut events = ledger.subscribe();
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);

        let record = ledger
            .record_day(&house, day, 30.2, &billing_page_policy(), false)
            .await
            .unwrap();
        assert_eq!(record.status, BillingStatus::Unpaid);

        let paid = ledger.mark_paid(&house, day).await.unwrap();
        assert_eq!(paid.status, BillingStatus::Paid);

        let stored = store.inner.get(&house, day).await.unwrap();
        assert_eq!(stored, Some(paid));

        let mut kinds = Vec::new();
        for _ in 0..2 {
            let msg = tokio::time::timeout(Duration::from_millis(100), events.recv())
                .await
                .expect("Timeout")
                .expect("No message");
            kinds.push(msg.event.event_type());
        }
        assert_eq!(kinds, vec!["record_created", "record_paid"]);
    }

    #[tokio::test]
    async fn store_listing_the_same_day_twice_is_an_error() {
        let store = Arc::new(FlakyStore::new());
        let ledger = LedgerService::new(store.clone());
        let house = HouseholdId::from(7u32);
        ledger
            .record_day(&house, date(2024, 9, 10), 30.2, &billing_page_policy(), false)
            .await
            .unwrap();

        store.duplicate_listing.store(true, Ordering::SeqCst);
        let err = ledger.history(&house, HistoryRange::all()).await.unwrap_err();
        assert!(matches!(err, DomainError::StoreUnavailable(_)));
        assert!(ledger.current_balance(&house).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_for_one_day_bill_once() {
        let ledger = Arc::new(service());
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let ledger = ledger.clone();
            let house = house.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .record_day(&house, day, 30.2, &billing_page_policy(), false)
                    .await
            }));
        }

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(DomainError::DuplicateRecord { .. }) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(duplicates, 31);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn households_are_billed_independently() {
        let ledger = Arc::new(service());
        let day = date(2024, 9, 10);

        let mut handles = Vec::new();
        for house in 0..16u32 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let id = HouseholdId::from(house);
                ledger
                    .record_day(&id, day, 30.2, &billing_page_policy(), false)
                    .await?;
                ledger.mark_paid(&id, day).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().status, BillingStatus::Paid);
        }

        for house in 0..16u32 {
            let id = HouseholdId::from(house);
            assert_eq!(ledger.current_balance(&id).await.unwrap(), Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn ledger_changes_are_published() {
        let ledger = service();
        let mut events = ledger.subscribe();
        let house = HouseholdId::from(7u32);
        let day = date(2024, 9, 10);
        let policy = billing_page_policy();

        ledger.record_day(&house, day, 30.2, &policy, false).await.unwrap();
        ledger.record_day(&house, day, 31.0, &policy, true).await.unwrap();
        ledger.mark_paid(&house, day).await.unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let msg = tokio::time::timeout(Duration::from_millis(100), events.recv())
                .await
                .expect("Timeout")
                .expect("No message");
            kinds.push(msg.event.event_type());
        }
        assert_eq!(kinds, vec!["record_created", "record_replaced", "record_paid"]);
    }

    #[tokio::test]
    async fn readings_from_metering_source_are_billed() {
        let ledger = service();
        let reading =
            ConsumptionReading::new(HouseholdId::from(7u32), date(2024, 9, 10), 30.2).unwrap();
        let record = ledger
            .record_reading(&reading, &billing_page_policy(), false)
            .await
            .unwrap();
        assert_eq!(record.amount_due, d("1.70"));
    }
}
