//! # Household Billing Engine
//!
//! Turns a household's metered daily consumption into billing records under
//! a target/tolerance/rate policy, and keeps each household's payment ledger.
//!
//! ## Architecture
//!
//! - **domain**: policy, evaluator, billing records and the record store port
//! - **application**: `LedgerService`, the per-household ledger owner
//! - **infrastructure**: in-memory and JSON-file record stores
//! - **notifications**: broadcast of ledger changes for the display layer
//! - **shared**: error types and the retry helper

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod notifications;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::LedgerService;
pub use domain::{
    BillingPolicy, BillingRecord, BillingStatus, BillingSummary, ConsumptionReading, Evaluation,
    History, HistoryRange, HouseholdId, PolicyEvaluator, RecordStore,
};
pub use infrastructure::{InMemoryRecordStore, JsonFileRecordStore};
pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
pub use shared::{ConfigError, DomainError, DomainResult};
