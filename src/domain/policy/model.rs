//! Billing policy entity

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::{DomainError, DomainResult};

/// Daily billing policy: usage above `target + tolerance` is charged at
/// `rate_per_kwh`.
///
/// Fields are private so every instance, including deserialized ones,
/// has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy")]
pub struct BillingPolicy {
    /// Daily consumption target (kWh)
    target: Decimal,
    /// Slack above the target before any charge applies (kWh)
    tolerance: Decimal,
    /// Price per excess kWh (currency units)
    rate_per_kwh: Decimal,
}

#[derive(Deserialize)]
struct RawPolicy {
    target: Decimal,
    tolerance: Decimal,
    rate_per_kwh: Decimal,
}

impl TryFrom<RawPolicy> for BillingPolicy {
    type Error = DomainError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        Self::new(raw.target, raw.tolerance, raw.rate_per_kwh)
    }
}

impl BillingPolicy {
    pub fn new(target: Decimal, tolerance: Decimal, rate_per_kwh: Decimal) -> DomainResult<Self> {
        let policy = Self {
            target,
            tolerance,
            rate_per_kwh,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Build a policy from floating-point settings (config files, UI input).
    pub fn from_f64(target: f64, tolerance: f64, rate_per_kwh: f64) -> DomainResult<Self> {
        Self::new(
            quantity_from_f64(target, "target")?,
            quantity_from_f64(tolerance, "tolerance")?,
            quantity_from_f64(rate_per_kwh, "rate_per_kwh")?,
        )
    }

    pub fn target(&self) -> Decimal {
        self.target
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    pub fn rate_per_kwh(&self) -> Decimal {
        self.rate_per_kwh
    }

    /// Consumption above which billing kicks in.
    pub fn threshold(&self) -> DomainResult<Decimal> {
        self.target
            .checked_add(self.tolerance)
            .ok_or_else(|| DomainError::InvalidInput("policy threshold overflows".to_string()))
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_non_negative(self.target, "target")?;
        ensure_non_negative(self.tolerance, "tolerance")?;
        ensure_non_negative(self.rate_per_kwh, "rate_per_kwh")?;
        Ok(())
    }
}

impl fmt::Display for BillingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target {} kWh, tolerance {} kWh, rate {}/kWh",
            self.target, self.tolerance, self.rate_per_kwh
        )
    }
}

fn ensure_non_negative(value: Decimal, field: &str) -> DomainResult<()> {
    if value < Decimal::ZERO {
        return Err(DomainError::InvalidInput(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

/// Convert a non-negative, finite float into a `Decimal`.
///
/// Goes through the shortest round-trip text form, so `30.2` becomes
/// exactly `30.2` rather than its binary approximation.
pub fn quantity_from_f64(value: f64, field: &str) -> DomainResult<Decimal> {
    if !value.is_finite() {
        return Err(DomainError::InvalidInput(format!(
            "{field} must be finite, got {value}"
        )));
    }
    if value < 0.0 {
        return Err(DomainError::InvalidInput(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    if value == 0.0 {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&value.to_string()).map_err(|e| {
        DomainError::InvalidInput(format!("{field} is out of range ({value}): {e}"))
    })
}
