//! Application layer - ledger use cases on top of the domain and store

pub mod services;

pub use services::LedgerService;
