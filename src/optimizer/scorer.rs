//! Profitability scoring - turns metrics snapshots into comparable scores.
//!
//! Scoring is pure computation: no IO, no clock, no hidden state. A chain
//! that cannot be scored (zero network hash rate, nonpositive block time,
//! non-finite inputs) is excluded entirely rather than given a zero score.

use crate::optimizer::registry::ChainRegistry;
use crate::optimizer::types::{MetricsSnapshot, ScoreResult, SnapshotMap, Strategy};
use crate::types::ChainKey;
use std::collections::HashMap;
use tracing::debug;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Guard for the network-share division.
const MIN_NETWORK_HASH_RATE: f64 = f64::EPSILON;

/// Scores chains under a fixed strategy.
#[derive(Debug, Clone)]
pub struct ProfitabilityScorer {
    strategy: Strategy,
    /// Normalizer for the stability damping term
    reference_difficulty: f64,
}

impl ProfitabilityScorer {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            reference_difficulty: 1_000_000_000.0,
        }
    }

    pub fn with_reference_difficulty(mut self, reference_difficulty: f64) -> Self {
        self.reference_difficulty = reference_difficulty;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Score every scoreable snapshot. Chains absent from the result could
    /// not be scored this cycle.
    pub fn score_all(
        &self,
        snapshots: &SnapshotMap,
        user_hash_rate: f64,
    ) -> HashMap<ChainKey, ScoreResult> {
        let mut scores = HashMap::new();
        for (key, snapshot) in snapshots {
            if let Some(result) = self.score_chain(snapshot, user_hash_rate) {
                scores.insert(key.clone(), result);
            } else {
                debug!("Chain {} is unscoreable this cycle", key);
            }
        }
        scores
    }

    /// Score a single snapshot, or `None` when it cannot be scored.
    pub fn score_chain(
        &self,
        snapshot: &MetricsSnapshot,
        user_hash_rate: f64,
    ) -> Option<ScoreResult> {
        if snapshot.network_hash_rate <= 0.0 || snapshot.block_time_secs <= 0.0 {
            return None;
        }
        if !snapshot.difficulty.is_finite()
            || !snapshot.block_reward.is_finite()
            || !snapshot.network_hash_rate.is_finite()
        {
            return None;
        }

        let network_share =
            user_hash_rate / snapshot.network_hash_rate.max(MIN_NETWORK_HASH_RATE);
        let blocks_per_day = SECONDS_PER_DAY / snapshot.block_time_secs;
        let mining_daily_reward = network_share * blocks_per_day * snapshot.block_reward;
        let staking_daily_reward = snapshot.staking_daily_reward.max(0.0);
        let combined_daily_reward = mining_daily_reward + staking_daily_reward;

        let price = if snapshot.token_price_usd > 0.0 {
            snapshot.token_price_usd
        } else {
            1.0
        };
        let value_score_usd = combined_daily_reward * price;

        let has_staking = staking_daily_reward > 0.0;
        let score = match self.strategy {
            Strategy::LowestDifficulty => -snapshot.difficulty,
            Strategy::Profitability => {
                let base = value_score_usd;
                if has_staking {
                    base * 1.10
                } else {
                    base
                }
            }
            Strategy::Stability => {
                let damping = 1.0 - snapshot.difficulty / self.reference_difficulty;
                let base = value_score_usd * damping;
                if has_staking {
                    base * 1.05
                } else {
                    base
                }
            }
            Strategy::Balanced => {
                let base = 0.7 * value_score_usd + 0.3 * (network_share * 1000.0);
                if has_staking {
                    base * 1.08
                } else {
                    base
                }
            }
        };

        Some(ScoreResult {
            chain_key: snapshot.chain_key.clone(),
            mining_daily_reward,
            staking_daily_reward,
            combined_daily_reward,
            value_score_usd,
            network_share,
            difficulty: snapshot.difficulty,
            score,
            strategy: self.strategy,
        })
    }

    /// Highest-scoring chain, walking the registry in registration order so
    /// that exact ties resolve to the chain registered first.
    pub fn best_chain<'a>(
        &self,
        scores: &'a HashMap<ChainKey, ScoreResult>,
        registry: &ChainRegistry,
    ) -> Option<&'a ScoreResult> {
        let mut best: Option<&ScoreResult> = None;
        for chain in registry.all() {
            if let Some(result) = scores.get(&chain.key) {
                match best {
                    Some(current) if result.score <= current.score => {}
                    _ => best = Some(result),
                }
            }
        }
        best
    }
}
