//! Ledger events
//!
//! Published whenever a household's ledger changes so the display layer can
//! refresh its billing view without polling.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{BillingRecord, BillingStatus, HouseholdId};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A new billing record was created
    RecordCreated(RecordEvent),
    /// An unpaid/no-charge record was replaced by a fresh reading
    RecordReplaced(RecordEvent),
    /// An unpaid record was paid
    RecordPaid(RecordEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::RecordCreated(_) => "record_created",
            Event::RecordReplaced(_) => "record_replaced",
            Event::RecordPaid(_) => "record_paid",
        }
    }

    pub fn household_id(&self) -> &HouseholdId {
        match self {
            Event::RecordCreated(e) | Event::RecordReplaced(e) | Event::RecordPaid(e) => {
                &e.household_id
            }
        }
    }
}

/// Snapshot of the record an event refers to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEvent {
    pub household_id: HouseholdId,
    pub date: NaiveDate,
    pub amount_due: Decimal,
    pub status: BillingStatus,
}

impl From<&BillingRecord> for RecordEvent {
    fn from(record: &BillingRecord) -> Self {
        Self {
            household_id: record.household_id.clone(),
            date: record.date,
            amount_due: record.amount_due,
            status: record.status,
        }
    }
}

/// Event with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}
