pub mod household;
pub mod ledger;
pub mod policy;

// Re-export commonly used types
pub use household::HouseholdId;
pub use ledger::{
    BillingRecord, BillingStatus, BillingSummary, ConsumptionReading, History, HistoryRange,
    RecordStore,
};
pub use policy::{BillingPolicy, Evaluation, PolicyEvaluator};

// Re-export DomainError from shared for convenience
pub use crate::shared::{DomainError, DomainResult};
