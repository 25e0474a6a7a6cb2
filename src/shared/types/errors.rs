use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{BillingStatus, HouseholdId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Billing record already exists for household {household_id} on {date}")]
    DuplicateRecord {
        household_id: HouseholdId,
        date: NaiveDate,
    },

    #[error("Billing record for household {household_id} on {date} is paid and cannot be changed")]
    RecordLocked {
        household_id: HouseholdId,
        date: NaiveDate,
    },

    #[error("Not found: billing record for household {household_id} on {date}")]
    NotFound {
        household_id: HouseholdId,
        date: NaiveDate,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: BillingStatus,
        to: BillingStatus,
    },

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DomainError {
    /// Whether the operation may succeed if retried.
    /// The engine never writes partially, so only store outages qualify.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::StoreUnavailable(_))
    }

    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::InvalidInput(_) => "invalid_input",
            DomainError::DuplicateRecord { .. } => "duplicate_record",
            DomainError::RecordLocked { .. } => "record_locked",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidTransition { .. } => "invalid_transition",
            DomainError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid billing policy in config: {0}")]
    Policy(#[from] DomainError),
}
