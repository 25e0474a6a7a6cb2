//! Ledger aggregate
//!
//! Billing records, their status machine, and the store they live in.

pub mod model;
pub mod repository;

pub use model::{
    BillingRecord, BillingStatus, BillingSummary, ConsumptionReading, History, HistoryRange,
};
pub use repository::RecordStore;
