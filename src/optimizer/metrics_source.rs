//! Metrics sources - where per-chain metrics snapshots come from.
//!
//! The optimizer only ever talks to the `ChainMetricsSource` trait; how the
//! numbers are obtained (node RPC, cache, simulation) stays behind it.

use crate::optimizer::types::MetricsSnapshot;
use crate::types::ChainDescriptor;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

/// Supplies a metrics snapshot for a single chain.
///
/// Implementations must complete or fail within a bounded time; the
/// aggregator additionally enforces its own per-call timeout.
#[async_trait]
pub trait ChainMetricsSource: Send + Sync {
    async fn fetch(&self, chain: &ChainDescriptor) -> Result<MetricsSnapshot>;
}

/// Metrics source backed by a node's HTTP metrics endpoint.
///
/// Sends `{"chainId": .., "chainKey": ..}` and reads the numeric fields of
/// the JSON reply, defaulting each to 0 when absent (block time defaults to
/// 10 s, matching what nodes report for a healthy chain). Responses are
/// cached briefly so the fast cadence does not hammer the node.
pub struct RpcMetricsSource {
    endpoint: String,
    http_client: Client,
    request_timeout: Duration,
    retry_attempts: usize,
    cache: Cache<String, MetricsSnapshot>,
}

impl RpcMetricsSource {
    pub fn new(endpoint: &str, request_timeout: Duration, retry_attempts: usize) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            http_client: Client::new(),
            request_timeout,
            retry_attempts,
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(5))
                .max_capacity(64)
                .build(),
        }
    }

    #[instrument(skip(self), fields(chain = %chain.key))]
    async fn fetch_uncached(&self, chain: &ChainDescriptor) -> Result<MetricsSnapshot> {
        let body = serde_json::json!({
            "chainId": chain.id,
            "chainKey": chain.key,
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .with_context(|| format!("metrics request for {} failed", chain.key))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "metrics endpoint returned {} for {}",
                response.status(),
                chain.key
            ));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("metrics response for {} is not JSON", chain.key))?;

        let field = |name: &str, default: f64| data[name].as_f64().unwrap_or(default);

        let snapshot = MetricsSnapshot {
            chain_key: chain.key.clone(),
            difficulty: field("difficulty", 0.0),
            block_reward: field("blockReward", 0.0),
            block_time_secs: field("blockTime", 10.0),
            network_hash_rate: field("networkHashRate", 0.0),
            token_price_usd: field("price", 0.0),
            staking_apy: field("stakingAPY", 0.0),
            staking_daily_reward: field("stakingRewards", 0.0),
            fetched_at: chrono::Utc::now().timestamp_millis() as u64,
        };

        debug!(
            "Fetched metrics for {}: difficulty {:.0}, reward {:.4}",
            chain.key, snapshot.difficulty, snapshot.block_reward
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl ChainMetricsSource for RpcMetricsSource {
    async fn fetch(&self, chain: &ChainDescriptor) -> Result<MetricsSnapshot> {
        if let Some(cached) = self.cache.get(&chain.key).await {
            debug!("Serving cached metrics for {}", chain.key);
            return Ok(cached);
        }

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(2))
            .take(self.retry_attempts);

        let snapshot = Retry::spawn(retry_strategy, || self.fetch_uncached(chain)).await?;
        self.cache.insert(chain.key.clone(), snapshot.clone()).await;
        Ok(snapshot)
    }
}

/// Base metric profile for one simulated chain.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedChainProfile {
    pub difficulty: f64,
    pub block_reward: f64,
    pub block_time_secs: f64,
    pub network_hash_rate: f64,
    pub token_price_usd: f64,
    pub staking_daily_reward: f64,
    pub staking_apy: f64,
}

impl Default for SimulatedChainProfile {
    fn default() -> Self {
        Self {
            difficulty: 1_000_000.0,
            block_reward: 2.0,
            block_time_secs: 10.0,
            network_hash_rate: 5_000_000.0,
            token_price_usd: 1.0,
            staking_daily_reward: 0.0,
            staking_apy: 0.0,
        }
    }
}

/// Deterministic, seedable metrics source for the demo binary and tests.
///
/// Each fetch perturbs the chain's base profile by a few percent so cycles
/// see plausibly moving markets without any network dependency.
pub struct SimulatedMetricsSource {
    profiles: HashMap<String, SimulatedChainProfile>,
    rng: Mutex<StdRng>,
}

impl SimulatedMetricsSource {
    pub fn new(seed: u64) -> Self {
        Self {
            profiles: HashMap::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn with_profile(mut self, chain_key: &str, profile: SimulatedChainProfile) -> Self {
        self.profiles.insert(chain_key.to_string(), profile);
        self
    }
}

#[async_trait]
impl ChainMetricsSource for SimulatedMetricsSource {
    async fn fetch(&self, chain: &ChainDescriptor) -> Result<MetricsSnapshot> {
        let profile = self
            .profiles
            .get(&chain.key)
            .copied()
            .ok_or_else(|| anyhow!("no simulated profile for {}", chain.key))?;

        let jitter = {
            let mut rng = self.rng.lock().await;
            rng.gen_range(0.97..1.03)
        };

        Ok(MetricsSnapshot {
            chain_key: chain.key.clone(),
            difficulty: profile.difficulty * jitter,
            block_reward: profile.block_reward,
            block_time_secs: profile.block_time_secs,
            network_hash_rate: profile.network_hash_rate * jitter,
            token_price_usd: profile.token_price_usd,
            staking_apy: profile.staking_apy,
            staking_daily_reward: profile.staking_daily_reward,
            fetched_at: chrono::Utc::now().timestamp_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainDescriptor, ChainLevel};

    fn test_chain(key: &str) -> ChainDescriptor {
        ChainDescriptor::new(0, key, key, ChainLevel::Prime, "QUAI", true)
    }

    #[tokio::test]
    async fn test_simulated_source_returns_profile() {
        let source = SimulatedMetricsSource::new(7).with_profile(
            "prime",
            SimulatedChainProfile {
                difficulty: 500.0,
                block_reward: 3.0,
                ..Default::default()
            },
        );

        let snapshot = source.fetch(&test_chain("prime")).await.unwrap();
        assert_eq!(snapshot.chain_key, "prime");
        assert_eq!(snapshot.block_reward, 3.0);
        // Jitter stays within a few percent of the base difficulty
        assert!(snapshot.difficulty > 450.0 && snapshot.difficulty < 550.0);
    }

    #[tokio::test]
    async fn test_simulated_source_unknown_chain_fails() {
        let source = SimulatedMetricsSource::new(7);
        assert!(source.fetch(&test_chain("ghost")).await.is_err());
    }
}
