//! Ledger entities: readings, billing records and history views

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::policy::{quantity_from_f64, BillingPolicy, Evaluation};
use crate::domain::HouseholdId;
use crate::shared::{DomainError, DomainResult};

/// Payment status of a billing record
///
/// `Unpaid` and `NoCharge` are decided once, when the record is created.
/// `Paid` and `NoCharge` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingStatus {
    Unpaid,
    Paid,
    NoCharge,
}

impl BillingStatus {
    /// Status a freshly evaluated record starts in.
    pub fn initial(evaluation: &Evaluation) -> Self {
        if evaluation.is_chargeable() {
            Self::Unpaid
        } else {
            Self::NoCharge
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::NoCharge)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::NoCharge => "no_charge",
        }
    }
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "Unpaid"),
            Self::Paid => write!(f, "Paid"),
            Self::NoCharge => write!(f, "No charge"),
        }
    }
}

/// One metered day for one household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionReading {
    pub household_id: HouseholdId,
    pub date: NaiveDate,
    pub consumption_kwh: f64,
}

impl ConsumptionReading {
    pub fn new(household_id: HouseholdId, date: NaiveDate, consumption_kwh: f64) -> DomainResult<Self> {
        let reading = Self {
            household_id,
            date,
            consumption_kwh,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Numeric well-formedness only; freshness and sensor authenticity are
    /// the metering source's concern.
    pub fn validate(&self) -> DomainResult<()> {
        self.household_id.validate()?;
        quantity_from_f64(self.consumption_kwh, "consumption_kwh")?;
        Ok(())
    }
}

/// Billing outcome for one household-day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub household_id: HouseholdId,
    pub date: NaiveDate,
    pub consumption_kwh: Decimal,
    pub excess_kwh: Decimal,
    pub amount_due: Decimal,
    pub status: BillingStatus,
    /// Policy in force when the amount was computed
    pub policy: BillingPolicy,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl BillingRecord {
    pub fn new(
        household_id: HouseholdId,
        date: NaiveDate,
        consumption_kwh: Decimal,
        evaluation: Evaluation,
        policy: BillingPolicy,
    ) -> Self {
        Self {
            household_id,
            date,
            consumption_kwh,
            excess_kwh: evaluation.excess_kwh,
            amount_due: evaluation.amount_due,
            status: BillingStatus::initial(&evaluation),
            policy,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.status == BillingStatus::Unpaid
    }

    /// Unpaid → Paid. Every other transition is rejected.
    pub fn mark_paid(&mut self, paid_at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != BillingStatus::Unpaid {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: BillingStatus::Paid,
            });
        }
        self.status = BillingStatus::Paid;
        self.paid_at = Some(paid_at);
        Ok(())
    }

    /// Whether a fresh reading may replace this record.
    pub fn ensure_replaceable(&self) -> DomainResult<()> {
        if self.status == BillingStatus::Paid {
            return Err(DomainError::RecordLocked {
                household_id: self.household_id.clone(),
                date: self.date,
            });
        }
        Ok(())
    }
}

/// Inclusive date window for history queries; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl HistoryRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn since(mut self, from: NaiveDate) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: NaiveDate) -> Self {
        self.to = Some(to);
        self
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(DomainError::InvalidInput(format!(
                    "history range start {from} is after end {to}"
                )));
            }
        }
        Ok(())
    }
}

/// Snapshot of a household's ledger, ascending by date.
///
/// Iterating is lazy and can be repeated; the snapshot does not change when
/// the ledger does.
#[derive(Debug, Clone)]
pub struct History {
    records: Arc<[BillingRecord]>,
}

impl History {
    /// `records` must already be ordered by date with no duplicates;
    /// `LedgerService::history` checks this before building a snapshot.
    pub(crate) fn new(records: Vec<BillingRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BillingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&BillingRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&BillingRecord> {
        self.records.last()
    }

    pub fn to_vec(&self) -> Vec<BillingRecord> {
        self.records.to_vec()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a BillingRecord;
    type IntoIter = std::slice::Iter<'a, BillingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// What the billing page needs for its "Payment Due" card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub household_id: HouseholdId,
    pub latest: Option<BillingRecord>,
    pub balance: Decimal,
    pub unpaid_records: usize,
    pub payment_due: bool,
}
