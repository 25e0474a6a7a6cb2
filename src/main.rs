//! Replays a file of metered readings through the billing engine and prints
//! each household's billing summary as JSON.
//!
//! ```sh
//! household-billing readings.json
//! BILLING_CONFIG=/etc/household-billing/config.toml household-billing readings.json
//! ```
//!
//! The readings file is a JSON array of
//! `{"household_id": "7", "date": "2024-09-10", "consumption_kwh": 30.2}`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use household_billing::config::StoreKind;
use household_billing::logging::init_tracing;
use household_billing::shared::{retry_with_backoff, RetryConfig};
use household_billing::{
    default_config_path, AppConfig, ConsumptionReading, DomainError, InMemoryRecordStore,
    JsonFileRecordStore, LedgerService, RecordStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = default_config_path();
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg.logging);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_tracing(&cfg.logging);
            warn!("Failed to load config {}: {}. Using defaults.", config_path.display(), e);
            cfg
        }
    };

    let policy = app_cfg.billing.policy()?;
    info!(%policy, currency = app_cfg.billing.currency.as_str(), "Billing policy");

    // ── Record store ───────────────────────────────────────────
    let store: Arc<dyn RecordStore> = match app_cfg.store.kind {
        StoreKind::Memory => Arc::new(InMemoryRecordStore::new()),
        StoreKind::Json => Arc::new(JsonFileRecordStore::open(&app_cfg.store.path).await?),
    };
    let ledger = LedgerService::new(store).with_store_timeout(app_cfg.store.timeout());

    // ── Replay readings ────────────────────────────────────────
    let Some(readings_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        error!("Usage: household-billing <readings.json>");
        return Err("missing readings file".into());
    };
    let readings: Vec<ConsumptionReading> =
        serde_json::from_slice(&tokio::fs::read(&readings_path).await?)?;
    info!(count = readings.len(), path = %readings_path.display(), "Replaying readings");

    let mut households = BTreeSet::new();
    let mut rejected = 0usize;
    for reading in &readings {
        let result = retry_with_backoff(
            RetryConfig::default(),
            || ledger.record_reading(reading, &policy, false),
            DomainError::is_transient,
            "record_reading",
        )
        .await;

        match result {
            Ok(_) => {
                households.insert(reading.household_id.clone());
            }
            Err(e) => {
                // Already logged by the ledger; keep going with the rest
                rejected += 1;
                if e.is_transient() {
                    return Err(e.into());
                }
            }
        }
    }

    for household_id in &households {
        let summary = ledger.summary(household_id).await?;
        println!("{}", serde_json::to_string(&summary)?);
    }

    info!(
        households = households.len(),
        accepted = readings.len() - rejected,
        rejected,
        "Replay finished"
    );
    Ok(())
}
