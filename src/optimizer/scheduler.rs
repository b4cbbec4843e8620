//! Optimizer scheduler - the periodic decision loop.
//!
//! One cycle runs aggregate -> score -> decide -> dispatch -> record. The
//! loop owns all mutable engine state; settings updates staged from outside
//! are applied between cycles, never mid-cycle. Disabling stops the timer
//! and lets any in-flight cycle (including its dispatch call) finish.

use crate::optimizer::aggregator::MetricsAggregator;
use crate::optimizer::dispatcher::{DispatcherAdapter, MiningDispatcher};
use crate::optimizer::engine::SwitchDecisionEngine;
use crate::optimizer::history::SwitchHistory;
use crate::optimizer::metrics_source::ChainMetricsSource;
use crate::optimizer::registry::ChainRegistry;
use crate::optimizer::scorer::ProfitabilityScorer;
use crate::optimizer::settings::{load_settings, save_settings, OptimizerSettings, SettingsStore};
use crate::optimizer::types::{
    Decision, HoldReason, OptimizerStats, ScoreResult, StakingYield, Strategy, SwitchEvent,
    SwitchEventSender,
};
use crate::types::ChainKey;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Caller-refreshed miner inputs, read at the start of each cycle.
#[derive(Debug, Clone, Default)]
pub struct MinerInputs {
    /// The miner's own hash rate in H/s
    pub hash_rate: f64,
    /// Externally tracked staking yield per chain
    pub staking: HashMap<ChainKey, StakingYield>,
}

/// Result of one cycle, for stats publication and tests.
#[derive(Debug)]
pub struct CycleOutcome {
    pub decision: Decision,
    pub event: Option<SwitchEvent>,
    pub scores: HashMap<ChainKey, ScoreResult>,
}

/// One full aggregate/score/decide/dispatch pass over the chains.
///
/// Owns the decision engine and history; the scheduler drives it on a timer,
/// tests drive it directly with an explicit clock.
pub struct OptimizerCycle {
    registry: Arc<ChainRegistry>,
    aggregator: MetricsAggregator,
    scorer: ProfitabilityScorer,
    engine: SwitchDecisionEngine,
    adapter: DispatcherAdapter,
    history: SwitchHistory,
    committed_switches: usize,
}

impl OptimizerCycle {
    pub fn new(
        registry: Arc<ChainRegistry>,
        source: Arc<dyn ChainMetricsSource>,
        dispatcher: Arc<dyn MiningDispatcher>,
        settings: &OptimizerSettings,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            aggregator: MetricsAggregator::new(source, fetch_timeout),
            scorer: ProfitabilityScorer::new(settings.strategy),
            engine: SwitchDecisionEngine::new(
                settings.min_switch_threshold,
                settings.cooldown(),
            ),
            adapter: DispatcherAdapter::new(dispatcher),
            history: SwitchHistory::new(settings.history_capacity),
            committed_switches: 0,
        }
    }

    /// Apply updated hysteresis parameters between cycles.
    pub fn apply_settings(&mut self, settings: &OptimizerSettings) {
        self.engine
            .update_params(settings.min_switch_threshold, settings.cooldown());
    }

    /// Run one cycle at `now_ms`. Never fails the caller: per-chain fetch
    /// errors are isolated by the aggregator and an empty snapshot map is a
    /// quiet hold.
    pub async fn run(&mut self, inputs: &MinerInputs, now_ms: u64) -> CycleOutcome {
        let enabled: Vec<_> = self.registry.enabled().into_iter().cloned().collect();
        let snapshots = self.aggregator.collect(&enabled, &inputs.staking).await;

        if snapshots.is_empty() {
            debug!("No chain answered this cycle; holding");
            return CycleOutcome {
                decision: Decision::Hold {
                    reason: HoldReason::NoScoreableChains,
                },
                event: None,
                scores: HashMap::new(),
            };
        }

        let scores = self.scorer.score_all(&snapshots, inputs.hash_rate);
        let best = self.scorer.best_chain(&scores, &self.registry);
        let decision = self.engine.decide(now_ms, best, &scores);

        let event = self
            .adapter
            .apply(
                &decision,
                now_ms,
                &self.registry,
                &mut self.engine,
                &mut self.history,
            )
            .await;
        if matches!(&event, Some(e) if e.committed) {
            self.committed_switches += 1;
        }

        CycleOutcome {
            decision,
            event,
            scores,
        }
    }

    pub fn current_target(&self) -> Option<&ChainKey> {
        self.engine.current_target()
    }

    pub fn history(&self) -> &SwitchHistory {
        &self.history
    }

    pub fn committed_switches(&self) -> usize {
        self.committed_switches
    }
}

struct Runner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    strategy: Strategy,
}

/// The chain-profitability optimizer.
///
/// At most one scheduler loop may be active per hash-power source; enabling
/// a second strategy while one runs is a configuration error rather than a
/// silent race between two loops issuing dispatch calls.
pub struct ChainOptimizer {
    registry: Arc<ChainRegistry>,
    source: Arc<dyn ChainMetricsSource>,
    dispatcher: Arc<dyn MiningDispatcher>,
    store: Arc<dyn SettingsStore>,
    event_sender: SwitchEventSender,
    fetch_timeout: Duration,
    inputs: Arc<RwLock<MinerInputs>>,
    pending_settings: Arc<Mutex<Option<OptimizerSettings>>>,
    stats: Arc<RwLock<OptimizerStats>>,
    runner: Mutex<Option<Runner>>,
}

impl ChainOptimizer {
    pub fn new(
        registry: ChainRegistry,
        source: Arc<dyn ChainMetricsSource>,
        dispatcher: Arc<dyn MiningDispatcher>,
        store: Arc<dyn SettingsStore>,
        event_sender: SwitchEventSender,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            source,
            dispatcher,
            store,
            event_sender,
            fetch_timeout,
            inputs: Arc::new(RwLock::new(MinerInputs::default())),
            pending_settings: Arc::new(Mutex::new(None)),
            stats: Arc::new(RwLock::new(OptimizerStats {
                enabled: false,
                strategy: Strategy::Profitability,
                current_target: None,
                switch_count: 0,
                last_switch: None,
                latest_scores: HashMap::new(),
            })),
            runner: Mutex::new(None),
        }
    }

    /// Refresh the miner's own hash rate; read at the next cycle start.
    pub async fn set_hash_rate(&self, hash_rate: f64) {
        self.inputs.write().await.hash_rate = hash_rate.max(0.0);
    }

    /// Refresh externally tracked staking yields.
    pub async fn update_staking(&self, staking: HashMap<ChainKey, StakingYield>) {
        self.inputs.write().await.staking = staking;
    }

    /// Validate, persist, and stage settings for the next cycle boundary.
    /// Changing strategy while a loop is active requires disable/enable.
    pub async fn update_settings(&self, settings: OptimizerSettings) -> Result<()> {
        settings.validate()?;
        {
            let runner = self.runner.lock().await;
            if let Some(active) = runner.as_ref() {
                if active.strategy != settings.strategy {
                    return Err(anyhow!(
                        "optimizer is running the {} strategy; disable it before switching to {}",
                        active.strategy,
                        settings.strategy
                    ));
                }
            }
        }
        save_settings(self.store.as_ref(), &settings).await?;
        *self.pending_settings.lock().await = Some(settings);
        Ok(())
    }

    /// Start the scheduler loop for a strategy. Fails if a loop is already
    /// active for this hash-power source.
    pub async fn enable(&self, strategy: Strategy) -> Result<()> {
        let mut runner = self.runner.lock().await;
        if let Some(active) = runner.as_ref() {
            return Err(anyhow!(
                "optimizer is already active with the {} strategy",
                active.strategy
            ));
        }

        let mut settings = load_settings(self.store.as_ref(), strategy).await?;
        if settings.strategy != strategy {
            // Stored settings belong to another strategy's cadence; rebase.
            settings = OptimizerSettings::for_strategy(strategy);
        }
        settings.enabled = true;
        save_settings(self.store.as_ref(), &settings).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cycle = OptimizerCycle::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            Arc::clone(&self.dispatcher),
            &settings,
            self.fetch_timeout,
        );

        {
            let mut stats = self.stats.write().await;
            stats.enabled = true;
            stats.strategy = strategy;
        }

        let handle = tokio::spawn(run_loop(
            cycle,
            settings,
            Arc::clone(&self.inputs),
            Arc::clone(&self.pending_settings),
            Arc::clone(&self.stats),
            self.event_sender.clone(),
            shutdown_rx,
        ));

        *runner = Some(Runner {
            shutdown: shutdown_tx,
            handle,
            strategy,
        });
        info!("Optimizer enabled with {} strategy", strategy);
        Ok(())
    }

    /// Stop the scheduler loop. Any in-flight cycle finishes normally.
    pub async fn disable(&self) -> Result<()> {
        let runner = self.runner.lock().await.take();
        let Some(runner) = runner else {
            return Ok(());
        };

        let _ = runner.shutdown.send(true);
        if let Err(e) = runner.handle.await {
            warn!("Optimizer loop ended abnormally: {}", e);
        }

        let mut settings = load_settings(self.store.as_ref(), runner.strategy).await?;
        settings.enabled = false;
        save_settings(self.store.as_ref(), &settings).await?;
        self.stats.write().await.enabled = false;
        info!("Optimizer disabled");
        Ok(())
    }

    pub async fn is_enabled(&self) -> bool {
        self.runner.lock().await.is_some()
    }

    /// Best-effort snapshot of current optimizer state.
    pub async fn stats(&self) -> OptimizerStats {
        self.stats.read().await.clone()
    }
}

async fn run_loop(
    mut cycle: OptimizerCycle,
    mut settings: OptimizerSettings,
    inputs: Arc<RwLock<MinerInputs>>,
    pending_settings: Arc<Mutex<Option<OptimizerSettings>>>,
    stats: Arc<RwLock<OptimizerStats>>,
    event_sender: SwitchEventSender,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Optimizer loop running: {} strategy, every {}s, cooldown {}s",
        settings.strategy, settings.check_interval_secs, settings.cooldown_secs
    );
    let mut interval = tokio::time::interval(settings.check_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Settings staged while we slept apply now, between cycles.
                if let Some(new_settings) = pending_settings.lock().await.take() {
                    if new_settings.check_interval_secs != settings.check_interval_secs {
                        interval = tokio::time::interval(new_settings.check_interval());
                        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                        // Consume the immediate first tick of the new timer.
                        interval.tick().await;
                    }
                    cycle.apply_settings(&new_settings);
                    info!(
                        "Applied settings update: threshold {:.2}%, cooldown {}s, every {}s",
                        new_settings.min_switch_threshold * 100.0,
                        new_settings.cooldown_secs,
                        new_settings.check_interval_secs
                    );
                    settings = new_settings;
                }

                let cycle_inputs = inputs.read().await.clone();
                let now_ms = chrono::Utc::now().timestamp_millis() as u64;
                match run_one_cycle(&mut cycle, &cycle_inputs, now_ms, &event_sender).await {
                    Ok(outcome) => publish_stats(&stats, &cycle, &settings, outcome).await,
                    Err(e) => error!("Cycle failed: {:#}; continuing on schedule", e),
                }
            }
            _ = shutdown.changed() => {
                info!("Optimizer loop shutting down");
                break;
            }
        }
    }
}

async fn run_one_cycle(
    cycle: &mut OptimizerCycle,
    inputs: &MinerInputs,
    now_ms: u64,
    event_sender: &SwitchEventSender,
) -> Result<CycleOutcome> {
    let outcome = cycle.run(inputs, now_ms).await;

    if let Some(event) = &outcome.event {
        if event_sender.send(event.clone()).await.is_err() {
            debug!("No switch event consumers attached");
        }
    }
    Ok(outcome)
}

async fn publish_stats(
    stats: &Arc<RwLock<OptimizerStats>>,
    cycle: &OptimizerCycle,
    settings: &OptimizerSettings,
    outcome: CycleOutcome,
) {
    let mut stats = stats.write().await;
    stats.enabled = true;
    stats.strategy = settings.strategy;
    stats.current_target = cycle.current_target().cloned();
    stats.switch_count = cycle.committed_switches();
    stats.last_switch = cycle.history().last().cloned();
    if !outcome.scores.is_empty() {
        stats.latest_scores = outcome.scores;
    }
}
