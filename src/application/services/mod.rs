pub mod ledger;

pub use ledger::{LedgerService, DEFAULT_STORE_TIMEOUT};
