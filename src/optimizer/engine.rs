//! Switch decision engine - hold or switch, with hysteresis.
//!
//! The engine is a pure state machine: it takes the clock and the cycle's
//! scores as inputs and never performs IO. State transitions commit only
//! after the dispatcher acknowledges a switch, so a failed dispatch leaves
//! the previous target (and its cooldown clock) untouched.

use crate::optimizer::types::{Decision, EngineState, HoldReason, ScoreResult};
use crate::types::ChainKey;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub struct SwitchDecisionEngine {
    state: EngineState,
    /// Fractional improvement over the current target required to switch
    min_improvement: f64,
    /// Minimum dwell time between committed switches
    cooldown: Duration,
}

impl SwitchDecisionEngine {
    pub fn new(min_improvement: f64, cooldown: Duration) -> Self {
        Self {
            state: EngineState::new(),
            min_improvement,
            cooldown,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn current_target(&self) -> Option<&ChainKey> {
        self.state.current_target.as_ref()
    }

    /// Apply new hysteresis parameters. Called between cycles only.
    pub fn update_params(&mut self, min_improvement: f64, cooldown: Duration) {
        self.min_improvement = min_improvement;
        self.cooldown = cooldown;
    }

    /// Evaluate one cycle. `best` must be the highest-scoring chain of
    /// `scores` under the active tie-break order; `now_ms` is unix millis.
    pub fn decide(
        &self,
        now_ms: u64,
        best: Option<&ScoreResult>,
        scores: &HashMap<ChainKey, ScoreResult>,
    ) -> Decision {
        let best = match best {
            Some(best) => best,
            None => {
                return Decision::Hold {
                    reason: HoldReason::NoScoreableChains,
                }
            }
        };

        let current = match &self.state.current_target {
            // First decision ever: take the best chain unconditionally.
            None => {
                return Decision::Switch {
                    from: None,
                    to: best.chain_key.clone(),
                    from_score: None,
                    to_score: best.score,
                    reason: format!("initial target under {} strategy", best.strategy),
                }
            }
            Some(current) => current,
        };

        if &best.chain_key == current {
            return Decision::Hold {
                reason: HoldReason::AlreadyOptimal,
            };
        }

        // Cooldown takes precedence over any score gap.
        let elapsed_ms = now_ms.saturating_sub(self.state.last_switch_at);
        if elapsed_ms < self.cooldown.as_millis() as u64 {
            debug!(
                "Cooldown active: {}ms since last switch, need {}ms",
                elapsed_ms,
                self.cooldown.as_millis()
            );
            return Decision::Hold {
                reason: HoldReason::CooldownActive,
            };
        }

        let current_score = scores.get(current).map(|r| r.score);
        let qualifies = match current_score {
            // Current target could not be scored this cycle: any scoreable
            // best is preferable to an unknown.
            None => true,
            Some(score) if score <= 0.0 => best.score > score,
            Some(score) => {
                let improvement = (best.score - score) / score.abs();
                improvement >= self.min_improvement
            }
        };

        if !qualifies {
            return Decision::Hold {
                reason: HoldReason::BelowThreshold,
            };
        }

        Decision::Switch {
            from: Some(current.clone()),
            to: best.chain_key.clone(),
            from_score: current_score,
            to_score: best.score,
            reason: match current_score {
                Some(score) if score > 0.0 => format!(
                    "{} strategy: {:.1}% improvement over {}",
                    best.strategy,
                    (best.score - score) / score.abs() * 100.0,
                    current
                ),
                _ => format!("{} strategy: current target fell behind", best.strategy),
            },
        }
    }

    /// Commit an acknowledged switch. `last_switch_at` never moves backwards.
    pub fn commit_switch(&mut self, to: &ChainKey, now_ms: u64) {
        self.state.current_target = Some(to.clone());
        self.state.last_switch_at = self.state.last_switch_at.max(now_ms);
    }
}
