//! Configuration module
//!
//! Settings are read from a TOML file (default
//! `<config dir>/household-billing/config.toml`, override with
//! `BILLING_CONFIG`). Every section is optional and falls back to the
//! defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::BillingPolicy;
use crate::shared::ConfigError;

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "BILLING_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub billing: BillingConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error (or any `EnvFilter` directive)
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Billing policy settings as written in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Daily consumption target (kWh)
    pub target: f64,
    /// Slack above the target before billing starts (kWh)
    pub tolerance: f64,
    /// Price per excess kWh
    pub rate_per_kwh: f64,
    /// Currency code (ISO 4217), used when rendering amounts
    pub currency: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            target: 25.0,
            tolerance: 5.0,
            rate_per_kwh: 8.5,
            currency: "INR".to_string(),
        }
    }
}

impl BillingConfig {
    /// Validated policy built from these settings.
    pub fn policy(&self) -> Result<BillingPolicy, ConfigError> {
        Ok(BillingPolicy::from_f64(
            self.target,
            self.tolerance,
            self.rate_per_kwh,
        )?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory for the JSON store
    pub path: PathBuf,
    /// Upper bound for a single store call
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: default_data_dir(),
            timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.billing.policy()?;
        Ok(config)
    }

    /// Write the config, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// `$BILLING_CONFIG`, else `<config dir>/household-billing/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("household-billing")
        .join("config.toml")
}

fn default_data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("household-billing")
        .join("ledgers")
}
