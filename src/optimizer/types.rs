//! Core types for the chain-profitability optimizer.
//!
//! Snapshots are created fresh each cycle and never mutated; scores are
//! derived from them and recomputed every cycle.

use crate::types::ChainKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Point-in-time metrics for one chain, as reported by the metrics source.
///
/// Numeric fields default to 0 when the source omits them; validity for
/// scoring is judged by the scorer, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chain_key: ChainKey,
    /// Network difficulty
    pub difficulty: f64,
    /// Block reward in the chain's native token
    pub block_reward: f64,
    /// Average seconds between blocks
    pub block_time_secs: f64,
    /// Total network hash rate in H/s
    pub network_hash_rate: f64,
    /// Token price in USD (0 when unknown)
    pub token_price_usd: f64,
    /// Staking APY in percent (0 when the chain has no staking)
    pub staking_apy: f64,
    /// Daily-normalized staking reward in the chain's native token
    pub staking_daily_reward: f64,
    /// Unix millis when the snapshot was taken
    pub fetched_at: u64,
}

/// Map of chain key to snapshot, containing only chains that answered.
pub type SnapshotMap = HashMap<ChainKey, MetricsSnapshot>;

/// Caller-refreshed staking yield for one chain, merged into snapshots that
/// lack staking data of their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StakingYield {
    pub daily_reward: f64,
    pub apy: f64,
}

/// Scoring strategy selecting how chains are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Chase the lowest difficulty; rewards are ignored.
    LowestDifficulty,
    /// Maximize combined mining + staking USD value.
    Profitability,
    /// Profitability damped by difficulty relative to a reference.
    Stability,
    /// Weighted blend of value and network share.
    Balanced,
}

impl Strategy {
    /// Cycle cadence this strategy runs at.
    pub fn default_check_interval(self) -> Duration {
        match self {
            Strategy::LowestDifficulty => Duration::from_secs(10),
            _ => Duration::from_secs(300),
        }
    }

    /// Minimum dwell time between committed switches.
    pub fn default_cooldown(self) -> Duration {
        match self {
            Strategy::LowestDifficulty => Duration::from_secs(30),
            _ => Duration::from_secs(600),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::LowestDifficulty => "lowestDifficulty",
            Strategy::Profitability => "profitability",
            Strategy::Stability => "stability",
            Strategy::Balanced => "balanced",
        };
        f.write_str(name)
    }
}

/// Per-chain scoring output for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub chain_key: ChainKey,
    /// Expected mining reward per day in native tokens
    pub mining_daily_reward: f64,
    /// Staking reward per day in native tokens
    pub staking_daily_reward: f64,
    /// Mining + staking per day
    pub combined_daily_reward: f64,
    /// Combined daily reward valued in USD (price fallback 1.0)
    pub value_score_usd: f64,
    /// User share of the network hash rate
    pub network_share: f64,
    /// Difficulty carried through for history deltas
    pub difficulty: f64,
    /// Final comparable score under the strategy
    pub score: f64,
    pub strategy: Strategy,
}

/// Mutable optimizer state, owned exclusively by the decision engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    /// Chain currently receiving hash power, if any
    pub current_target: Option<ChainKey>,
    /// Unix millis of the last committed switch (0 = never switched)
    pub last_switch_at: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            current_target: None,
            last_switch_at: 0,
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one decision-engine evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Keep the current target (or stay idle if there is none).
    Hold { reason: HoldReason },
    /// Redirect hash power to `to`.
    Switch {
        from: Option<ChainKey>,
        to: ChainKey,
        from_score: Option<f64>,
        to_score: f64,
        reason: String,
    },
}

/// Why the engine held instead of switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// No chain could be scored this cycle
    NoScoreableChains,
    /// The best chain is already the current target
    AlreadyOptimal,
    /// Minimum dwell time since the last switch has not elapsed
    CooldownActive,
    /// Improvement over the current target is below the threshold
    BelowThreshold,
}

/// One attempted switch, committed or not, as recorded by the history tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchEvent {
    pub from: Option<ChainKey>,
    pub to: ChainKey,
    pub from_score: Option<f64>,
    pub to_score: f64,
    /// Unix millis when the attempt happened
    pub timestamp: u64,
    pub reason: String,
    /// Whether the dispatcher acknowledged the switch
    pub committed: bool,
}

/// Snapshot of optimizer state for display and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerStats {
    pub enabled: bool,
    pub strategy: Strategy,
    pub current_target: Option<ChainKey>,
    pub switch_count: usize,
    pub last_switch: Option<SwitchEvent>,
    pub latest_scores: HashMap<ChainKey, ScoreResult>,
}

/// Channel for delivering committed and failed switch events to consumers.
pub type SwitchEventSender = tokio::sync::mpsc::Sender<SwitchEvent>;
pub type SwitchEventReceiver = tokio::sync::mpsc::Receiver<SwitchEvent>;
