//! Household identity

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::{DomainError, DomainResult};

/// Opaque household identifier (the house number shown on the billing page).
///
/// Surrounding whitespace is dropped however the id is built, so `" 7"` and
/// `"7"` name the same ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HouseholdId(String);

impl HouseholdId {
    /// Build an identifier, rejecting empty or whitespace-only values.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidInput(
                "household id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn validate(&self) -> DomainResult<()> {
        if self.0.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "household id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HouseholdId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for HouseholdId {
    fn from(value: String) -> Self {
        if value.trim().len() == value.len() {
            Self(value)
        } else {
            Self(value.trim().to_string())
        }
    }
}

impl TryFrom<String> for HouseholdId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<HouseholdId> for String {
    fn from(id: HouseholdId) -> Self {
        id.0
    }
}

impl From<u32> for HouseholdId {
    fn from(house_number: u32) -> Self {
        Self(house_number.to_string())
    }
}
