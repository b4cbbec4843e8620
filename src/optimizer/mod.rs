//! Chain-profitability optimizer.
//!
//! Metrics aggregation, multi-strategy scoring, and the hysteresis-gated
//! switch decision loop that directs a single hash-power source at the most
//! rewarding chain in the hierarchy.

pub mod aggregator;
pub mod dispatcher;
pub mod engine;
pub mod history;
pub mod metrics_source;
pub mod registry;
pub mod scheduler;
pub mod scorer;
pub mod settings;
pub mod types;

// Re-export main types
pub use types::{
    Decision, EngineState, HoldReason, MetricsSnapshot, OptimizerStats, ScoreResult, SnapshotMap,
    StakingYield, Strategy, SwitchEvent, SwitchEventReceiver, SwitchEventSender,
};

// Re-export key components
pub use aggregator::MetricsAggregator;
pub use dispatcher::{DispatchRequest, DispatcherAdapter, HttpDispatcher, LoggingDispatcher, MiningDispatcher};
pub use engine::SwitchDecisionEngine;
pub use history::{SwitchHistory, DEFAULT_HISTORY_CAPACITY};
pub use metrics_source::{
    ChainMetricsSource, RpcMetricsSource, SimulatedChainProfile, SimulatedMetricsSource,
};
pub use registry::ChainRegistry;
pub use scheduler::{ChainOptimizer, CycleOutcome, MinerInputs, OptimizerCycle};
pub use scorer::ProfitabilityScorer;
pub use settings::{
    load_settings, save_settings, MemorySettingsStore, OptimizerSettings, SettingsStore,
    SqliteSettingsStore,
};
