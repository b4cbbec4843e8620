//! Optimizer settings and their persistence.
//!
//! Settings cross the process boundary as one flat JSON record through a
//! string get/set store. Validation happens here, at the update boundary;
//! the scheduler loop only ever sees last-known-good settings.

use crate::optimizer::history::DEFAULT_HISTORY_CAPACITY;
use crate::optimizer::types::Strategy;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

const SETTINGS_KEY: &str = "optimizer.settings";

/// Durable optimizer configuration, excluding ephemeral engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub strategy: Strategy,
    /// Fractional improvement required to switch (0.05 = 5%)
    pub min_switch_threshold: f64,
    pub cooldown_secs: u64,
    pub check_interval_secs: u64,
    pub history_capacity: usize,
}

impl OptimizerSettings {
    /// Defaults for a strategy, using its cadence and cooldown.
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            enabled: false,
            strategy,
            min_switch_threshold: 0.05,
            cooldown_secs: strategy.default_cooldown().as_secs(),
            check_interval_secs: strategy.default_check_interval().as_secs(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Reject malformed settings before they reach the scheduler.
    pub fn validate(&self) -> Result<()> {
        if !self.min_switch_threshold.is_finite() || self.min_switch_threshold < 0.0 {
            return Err(anyhow!(
                "minSwitchThreshold must be a non-negative number, got {}",
                self.min_switch_threshold
            ));
        }
        if self.check_interval_secs == 0 {
            return Err(anyhow!("checkIntervalSecs must be positive"));
        }
        if self.cooldown_secs == 0 {
            return Err(anyhow!("cooldownSecs must be positive"));
        }
        if self.history_capacity == 0 {
            return Err(anyhow!("historyCapacity must be at least 1"));
        }
        Ok(())
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self::for_strategy(Strategy::Profitability)
    }
}

/// String-keyed persistence contract for optimizer settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Load settings from a store, falling back to strategy defaults when the
/// store has none.
pub async fn load_settings(
    store: &dyn SettingsStore,
    default_strategy: Strategy,
) -> Result<OptimizerSettings> {
    match store.get(SETTINGS_KEY).await? {
        Some(raw) => {
            let settings: OptimizerSettings =
                serde_json::from_str(&raw).context("stored settings are malformed")?;
            settings.validate()?;
            Ok(settings)
        }
        None => Ok(OptimizerSettings::for_strategy(default_strategy)),
    }
}

/// Validate and persist settings.
pub async fn save_settings(store: &dyn SettingsStore, settings: &OptimizerSettings) -> Result<()> {
    settings.validate()?;
    let raw = serde_json::to_string(settings).context("failed to serialize settings")?;
    store.set(SETTINGS_KEY, &raw).await
}

/// SQLite-backed settings store (single key/value table).
pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub async fn new(db_path: &str) -> Result<Arc<Self>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .context("failed to connect to settings database")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimizer_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create settings table")?;

        info!("Settings store ready at {}", db_path);
        Ok(Arc::new(Self { pool }))
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM optimizer_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("settings read failed")?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO optimizer_settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("settings write failed")?;
        Ok(())
    }
}

/// In-memory settings store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_defaults() {
        let slow = OptimizerSettings::for_strategy(Strategy::Profitability);
        assert_eq!(slow.check_interval_secs, 300);
        assert_eq!(slow.cooldown_secs, 600);

        let fast = OptimizerSettings::for_strategy(Strategy::LowestDifficulty);
        assert_eq!(fast.check_interval_secs, 10);
        assert_eq!(fast.cooldown_secs, 30);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = OptimizerSettings::default();
        settings.min_switch_threshold = -0.1;
        assert!(settings.validate().is_err());

        let mut settings = OptimizerSettings::default();
        settings.min_switch_threshold = f64::NAN;
        assert!(settings.validate().is_err());

        let mut settings = OptimizerSettings::default();
        settings.check_interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = OptimizerSettings::default();
        settings.history_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[tokio::test]
    async fn test_round_trip_through_memory_store() {
        let store = MemorySettingsStore::new();
        let mut settings = OptimizerSettings::for_strategy(Strategy::Balanced);
        settings.enabled = true;
        settings.min_switch_threshold = 0.08;

        save_settings(&store, &settings).await.unwrap();
        let loaded = load_settings(&store, Strategy::Profitability).await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let store = MemorySettingsStore::new();
        let loaded = load_settings(&store, Strategy::Stability).await.unwrap();
        assert_eq!(loaded, OptimizerSettings::for_strategy(Strategy::Stability));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_settings() {
        let store = MemorySettingsStore::new();
        let mut settings = OptimizerSettings::default();
        settings.cooldown_secs = 0;
        assert!(save_settings(&store, &settings).await.is_err());
        assert!(store.get(SETTINGS_KEY).await.unwrap().is_none());
    }

    #[test]
    fn test_settings_serialize_as_flat_camel_case_record() {
        let settings = OptimizerSettings::default();
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&settings).unwrap()).unwrap();
        assert_eq!(value["strategy"], "profitability");
        assert!(value["minSwitchThreshold"].is_number());
        assert!(value["checkIntervalSecs"].is_number());
    }
}
