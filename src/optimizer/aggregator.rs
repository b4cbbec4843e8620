//! Metrics aggregation - fan-out collection of snapshots across chains.
//!
//! One fetch task per enabled chain, each bounded by its own timeout. A
//! chain that fails or times out is logged and skipped; it never fails the
//! cycle or delays scoring beyond the timeout bound.

use crate::optimizer::metrics_source::ChainMetricsSource;
use crate::optimizer::types::{SnapshotMap, StakingYield};
use crate::types::{ChainDescriptor, ChainKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Collects snapshots for all enabled chains in parallel.
pub struct MetricsAggregator {
    source: Arc<dyn ChainMetricsSource>,
    fetch_timeout: Duration,
}

impl MetricsAggregator {
    pub fn new(source: Arc<dyn ChainMetricsSource>, fetch_timeout: Duration) -> Self {
        Self {
            source,
            fetch_timeout,
        }
    }

    /// Fetch snapshots for the given chains, waiting for every fetch to
    /// complete or time out before returning. The result contains only the
    /// chains that answered; staking yields supplied by the caller fill in
    /// snapshots whose source reported no staking data.
    pub async fn collect(
        &self,
        chains: &[ChainDescriptor],
        staking: &HashMap<ChainKey, StakingYield>,
    ) -> SnapshotMap {
        let mut tasks = JoinSet::new();
        for chain in chains {
            let source = Arc::clone(&self.source);
            let chain = chain.clone();
            let timeout = self.fetch_timeout;
            tasks.spawn(async move {
                let result = tokio::time::timeout(timeout, source.fetch(&chain)).await;
                (chain.key, result)
            });
        }

        let mut snapshots = SnapshotMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (key, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Metrics fetch task panicked: {}", e);
                    continue;
                }
            };
            match result {
                Ok(Ok(mut snapshot)) => {
                    if snapshot.staking_daily_reward == 0.0 {
                        if let Some(yield_) = staking.get(&key) {
                            snapshot.staking_daily_reward = yield_.daily_reward;
                            if snapshot.staking_apy == 0.0 {
                                snapshot.staking_apy = yield_.apy;
                            }
                        }
                    }
                    snapshots.insert(key, snapshot);
                }
                Ok(Err(e)) => {
                    warn!("Metrics fetch for {} failed: {}", key, e);
                }
                Err(_) => {
                    warn!(
                        "Metrics fetch for {} timed out after {:?}",
                        key, self.fetch_timeout
                    );
                }
            }
        }

        debug!(
            "Collected metrics for {}/{} chains",
            snapshots.len(),
            chains.len()
        );
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::types::MetricsSnapshot;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use crate::types::ChainLevel;

    /// Source where named chains fail or hang and the rest answer.
    struct FlakySource {
        failing: Vec<String>,
        hanging: Vec<String>,
    }

    #[async_trait]
    impl ChainMetricsSource for FlakySource {
        async fn fetch(&self, chain: &ChainDescriptor) -> Result<MetricsSnapshot> {
            if self.failing.iter().any(|k| k == &chain.key) {
                return Err(anyhow!("connection refused"));
            }
            if self.hanging.iter().any(|k| k == &chain.key) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(MetricsSnapshot {
                chain_key: chain.key.clone(),
                difficulty: 100.0,
                block_reward: 1.0,
                block_time_secs: 10.0,
                network_hash_rate: 1000.0,
                token_price_usd: 1.0,
                staking_apy: 0.0,
                staking_daily_reward: 0.0,
                fetched_at: 0,
            })
        }
    }

    fn chains(keys: &[&str]) -> Vec<ChainDescriptor> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| ChainDescriptor::new(i as u32, k, k, ChainLevel::Zone, "QI", true))
            .collect()
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_chain() {
        let source = Arc::new(FlakySource {
            failing: vec!["cyprus".to_string()],
            hanging: vec![],
        });
        let aggregator = MetricsAggregator::new(source, Duration::from_secs(1));

        let snapshots = aggregator
            .collect(&chains(&["prime", "cyprus", "paxos"]), &HashMap::new())
            .await;

        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.contains_key("prime"));
        assert!(snapshots.contains_key("paxos"));
        assert!(!snapshots.contains_key("cyprus"));
    }

    #[tokio::test]
    async fn test_timeout_does_not_block_other_chains() {
        let source = Arc::new(FlakySource {
            failing: vec![],
            hanging: vec!["hydra".to_string()],
        });
        let aggregator = MetricsAggregator::new(source, Duration::from_millis(50));

        let snapshots = aggregator
            .collect(&chains(&["prime", "hydra"]), &HashMap::new())
            .await;

        assert_eq!(snapshots.len(), 1);
        assert!(snapshots.contains_key("prime"));
    }

    #[tokio::test]
    async fn test_all_chains_failing_yields_empty_map() {
        let source = Arc::new(FlakySource {
            failing: vec!["prime".to_string(), "cyprus".to_string()],
            hanging: vec![],
        });
        let aggregator = MetricsAggregator::new(source, Duration::from_secs(1));

        let snapshots = aggregator
            .collect(&chains(&["prime", "cyprus"]), &HashMap::new())
            .await;
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_staking_overlay_fills_missing_yield() {
        let source = Arc::new(FlakySource {
            failing: vec![],
            hanging: vec![],
        });
        let aggregator = MetricsAggregator::new(source, Duration::from_secs(1));

        let mut staking = HashMap::new();
        staking.insert(
            "prime".to_string(),
            StakingYield {
                daily_reward: 0.5,
                apy: 4.2,
            },
        );

        let snapshots = aggregator.collect(&chains(&["prime"]), &staking).await;
        let prime = &snapshots["prime"];
        assert_eq!(prime.staking_daily_reward, 0.5);
        assert_eq!(prime.staking_apy, 4.2);
    }
}
