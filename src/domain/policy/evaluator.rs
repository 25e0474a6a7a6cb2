//! Consumption → charge calculation

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::model::{quantity_from_f64, BillingPolicy};
use crate::shared::{DomainError, DomainResult};

/// Decimal places kept for currency amounts.
pub const AMOUNT_SCALE: u32 = 2;

/// Result of applying a policy to one day of consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Consumption above `target + tolerance` (kWh), never negative
    pub excess_kwh: Decimal,
    /// Charge for the excess, rounded half-up to two decimals
    pub amount_due: Decimal,
}

impl Evaluation {
    pub fn is_chargeable(&self) -> bool {
        !self.amount_due.is_zero()
    }
}

/// Stateless evaluator; every call depends only on its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Evaluate a raw metered reading.
    pub fn evaluate(consumption_kwh: f64, policy: &BillingPolicy) -> DomainResult<Evaluation> {
        let consumption = quantity_from_f64(consumption_kwh, "consumption_kwh")?;
        Self::evaluate_decimal(consumption, policy)
    }

    /// Evaluate a reading already held as a decimal.
    pub fn evaluate_decimal(
        consumption_kwh: Decimal,
        policy: &BillingPolicy,
    ) -> DomainResult<Evaluation> {
        if consumption_kwh < Decimal::ZERO {
            return Err(DomainError::InvalidInput(format!(
                "consumption_kwh must be non-negative, got {consumption_kwh}"
            )));
        }
        policy.validate()?;

        let threshold = policy.threshold()?;
        let excess_kwh = consumption_kwh
            .checked_sub(threshold)
            .ok_or_else(|| DomainError::InvalidInput("excess consumption overflows".to_string()))?
            .max(Decimal::ZERO);

        let amount_due = excess_kwh
            .checked_mul(policy.rate_per_kwh())
            .ok_or_else(|| DomainError::InvalidInput("amount due overflows".to_string()))?
            .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);

        Ok(Evaluation {
            excess_kwh,
            amount_due,
        })
    }
}
