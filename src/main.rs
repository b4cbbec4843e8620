//! Main entry point for the hashpilot optimizer demo
//!
//! Wires a simulated metrics source and a dry-run dispatcher into the
//! optimizer and runs a few decision cycles over the chain hierarchy.

use anyhow::Result;
use hashpilot::optimizer::{
    ChainOptimizer, ChainRegistry, LoggingDispatcher, OptimizerSettings, SimulatedChainProfile,
    SimulatedMetricsSource, SqliteSettingsStore, StakingYield, Strategy, SwitchEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting hashpilot optimizer demo");

    let registry = ChainRegistry::quai_mainnet_all_enabled();
    let source = Arc::new(build_simulated_source());
    let dispatcher = Arc::new(LoggingDispatcher);
    let store = SqliteSettingsStore::new("./optimizer.db").await?;

    let (event_sender, mut event_receiver) = mpsc::channel::<SwitchEvent>(100);

    let optimizer = ChainOptimizer::new(
        registry,
        source,
        dispatcher,
        store,
        event_sender,
        Duration::from_secs(5),
    );

    // Print switch events as they happen
    let printer_handle = tokio::spawn(async move {
        while let Some(event) = event_receiver.recv().await {
            info!(
                "Switch event: {} -> {} (committed: {}) - {}",
                event.from.as_deref().unwrap_or("none"),
                event.to,
                event.committed,
                event.reason
            );
        }
    });

    // Demo cadence: a cycle every 2 seconds with a short cooldown
    let mut settings = OptimizerSettings::for_strategy(Strategy::Profitability);
    settings.check_interval_secs = 2;
    settings.cooldown_secs = 4;
    optimizer.update_settings(settings).await?;

    // The caller owns the hash-rate estimate and staking yields
    optimizer.set_hash_rate(250_000.0).await;
    let mut staking = HashMap::new();
    staking.insert(
        "cyprus".to_string(),
        StakingYield {
            daily_reward: 0.75,
            apy: 6.5,
        },
    );
    optimizer.update_staking(staking).await;

    optimizer.enable(Strategy::Profitability).await?;

    // Let the optimizer run a handful of cycles
    tokio::time::sleep(Duration::from_secs(9)).await;

    let stats = optimizer.stats().await;
    info!(
        "Stats: target {:?}, {} committed switches, {} chains scored",
        stats.current_target,
        stats.switch_count,
        stats.latest_scores.len()
    );

    optimizer.disable().await?;
    printer_handle.abort();

    info!("Demo complete");
    Ok(())
}

/// Simulated market where the Cyprus region out-earns Prime once its
/// staking yield is counted.
fn build_simulated_source() -> SimulatedMetricsSource {
    let mut source = SimulatedMetricsSource::new(42);
    let profiles = [
        (
            "prime",
            SimulatedChainProfile {
                difficulty: 8_000_000.0,
                block_reward: 3.0,
                block_time_secs: 10.0,
                network_hash_rate: 40_000_000.0,
                token_price_usd: 0.08,
                ..Default::default()
            },
        ),
        (
            "cyprus",
            SimulatedChainProfile {
                difficulty: 2_500_000.0,
                block_reward: 1.4,
                block_time_secs: 8.0,
                network_hash_rate: 9_000_000.0,
                token_price_usd: 0.05,
                staking_daily_reward: 0.75,
                staking_apy: 6.5,
                ..Default::default()
            },
        ),
        (
            "paxos",
            SimulatedChainProfile {
                difficulty: 2_900_000.0,
                block_reward: 1.2,
                block_time_secs: 8.0,
                network_hash_rate: 11_000_000.0,
                token_price_usd: 0.05,
                ..Default::default()
            },
        ),
        (
            "hydra",
            SimulatedChainProfile {
                difficulty: 3_200_000.0,
                block_reward: 1.3,
                block_time_secs: 9.0,
                network_hash_rate: 12_000_000.0,
                token_price_usd: 0.05,
                ..Default::default()
            },
        ),
    ];
    for (key, profile) in profiles {
        source = source.with_profile(key, profile);
    }
    // Zones answer with thinner markets
    for (key, difficulty) in [
        ("cyprus1", 700_000.0),
        ("cyprus2", 750_000.0),
        ("cyprus3", 820_000.0),
        ("paxos1", 900_000.0),
        ("paxos2", 950_000.0),
        ("paxos3", 990_000.0),
        ("hydra1", 1_050_000.0),
        ("hydra2", 1_100_000.0),
        ("hydra3", 1_200_000.0),
    ] {
        source = source.with_profile(
            key,
            SimulatedChainProfile {
                difficulty,
                block_reward: 0.6,
                block_time_secs: 6.0,
                network_hash_rate: 3_000_000.0,
                token_price_usd: 0.05,
                ..Default::default()
            },
        );
    }
    source
}
