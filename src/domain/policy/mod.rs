//! Billing policy aggregate
//!
//! Contains the policy entity and the pure excess/amount calculation.

pub mod evaluator;
pub mod model;

pub use evaluator::{Evaluation, PolicyEvaluator, AMOUNT_SCALE};
pub use model::{quantity_from_f64, BillingPolicy};
