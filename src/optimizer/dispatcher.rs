//! Mining dispatcher seam - carrying out switch decisions.
//!
//! The dispatcher owns whatever restart/reconfigure dance the mining
//! workload needs; the optimizer only sees acknowledged success or failure.
//! Engine state commits strictly after acknowledgement, so a failed dispatch
//! keeps the previous target and the decision is retried on the next cycle.

use crate::optimizer::engine::SwitchDecisionEngine;
use crate::optimizer::history::SwitchHistory;
use crate::optimizer::registry::ChainRegistry;
use crate::optimizer::types::{Decision, SwitchEvent};
use crate::types::ChainId;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A request to redirect hash power.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub target_chain_ids: Vec<ChainId>,
    pub reason: String,
}

/// Reconfigures the mining workload toward a target chain set.
#[async_trait]
pub trait MiningDispatcher: Send + Sync {
    /// Returns `Ok(true)` only when the dispatcher acknowledged the switch.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<bool>;
}

/// Dispatcher backed by the miner's HTTP control endpoint.
pub struct HttpDispatcher {
    endpoint: String,
    http_client: Client,
    request_timeout: Duration,
}

impl HttpDispatcher {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            http_client: Client::new(),
            request_timeout,
        }
    }
}

#[async_trait]
impl MiningDispatcher for HttpDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<bool> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .timeout(self.request_timeout)
            .send()
            .await
            .context("dispatch request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("dispatcher returned {}", response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("dispatcher response is not JSON")?;
        Ok(body["success"].as_bool().unwrap_or(false))
    }
}

/// Dispatcher that only logs, for demos and dry runs.
pub struct LoggingDispatcher;

#[async_trait]
impl MiningDispatcher for LoggingDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<bool> {
        info!(
            "Dispatch (dry run): chains {:?}, reason: {}",
            request.target_chain_ids, request.reason
        );
        Ok(true)
    }
}

/// Applies decisions through a dispatcher, committing engine state only on
/// acknowledged success and recording every attempt.
pub struct DispatcherAdapter {
    dispatcher: Arc<dyn MiningDispatcher>,
}

impl DispatcherAdapter {
    pub fn new(dispatcher: Arc<dyn MiningDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Execute a decision. Hold decisions are no-ops; switch decisions call
    /// the dispatcher and, on acknowledgement, commit the engine state.
    /// Returns the recorded event for any attempted switch.
    pub async fn apply(
        &self,
        decision: &Decision,
        now_ms: u64,
        registry: &ChainRegistry,
        engine: &mut SwitchDecisionEngine,
        history: &mut SwitchHistory,
    ) -> Option<SwitchEvent> {
        let (from, to, from_score, to_score, reason) = match decision {
            Decision::Hold { .. } => return None,
            Decision::Switch {
                from,
                to,
                from_score,
                to_score,
                reason,
            } => (from, to, from_score, to_score, reason),
        };

        let target_id = match registry.id_of(to) {
            Some(id) => id,
            None => {
                warn!("Decision targets unknown chain {}; ignoring", to);
                return None;
            }
        };

        let request = DispatchRequest {
            target_chain_ids: vec![target_id],
            reason: reason.clone(),
        };

        let committed = match self.dispatcher.dispatch(&request).await {
            Ok(true) => {
                engine.commit_switch(to, now_ms);
                info!(
                    "Switched {} -> {} ({})",
                    from.as_deref().unwrap_or("none"),
                    to,
                    reason
                );
                true
            }
            Ok(false) => {
                warn!("Dispatcher rejected switch to {}; will retry next cycle", to);
                false
            }
            Err(e) => {
                warn!("Dispatch to {} failed: {}; will retry next cycle", to, e);
                false
            }
        };

        let event = SwitchEvent {
            from: from.clone(),
            to: to.clone(),
            from_score: *from_score,
            to_score: *to_score,
            timestamp: now_ms,
            reason: reason.clone(),
            committed,
        };
        history.record(event.clone());
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Dispatcher that fails a fixed number of times before succeeding.
    struct FailingDispatcher {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FailingDispatcher {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MiningDispatcher for FailingDispatcher {
        async fn dispatch(&self, _request: &DispatchRequest) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(anyhow!("socket closed"));
            }
            Ok(true)
        }
    }

    fn switch_decision(to: &str) -> Decision {
        Decision::Switch {
            from: Some("prime".to_string()),
            to: to.to_string(),
            from_score: Some(1.0),
            to_score: 2.0,
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failed_dispatch_does_not_commit_state() {
        let adapter = DispatcherAdapter::new(Arc::new(FailingDispatcher::new(1)));
        let registry = ChainRegistry::quai_mainnet_all_enabled();
        let mut engine = SwitchDecisionEngine::new(0.05, Duration::from_secs(30));
        let mut history = SwitchHistory::default();
        engine.commit_switch(&"prime".to_string(), 1_000);

        let event = adapter
            .apply(
                &switch_decision("cyprus"),
                2_000,
                &registry,
                &mut engine,
                &mut history,
            )
            .await
            .unwrap();

        assert!(!event.committed);
        assert_eq!(engine.current_target().map(String::as_str), Some("prime"));
        assert_eq!(engine.state().last_switch_at, 1_000);
        assert_eq!(history.len(), 1);
        assert_eq!(history.committed_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_dispatch_commits_state() {
        let adapter = DispatcherAdapter::new(Arc::new(FailingDispatcher::new(0)));
        let registry = ChainRegistry::quai_mainnet_all_enabled();
        let mut engine = SwitchDecisionEngine::new(0.05, Duration::from_secs(30));
        let mut history = SwitchHistory::default();

        let event = adapter
            .apply(
                &switch_decision("cyprus"),
                2_000,
                &registry,
                &mut engine,
                &mut history,
            )
            .await
            .unwrap();

        assert!(event.committed);
        assert_eq!(engine.current_target().map(String::as_str), Some("cyprus"));
        assert_eq!(engine.state().last_switch_at, 2_000);
        assert_eq!(history.committed_count(), 1);
    }

    #[tokio::test]
    async fn test_hold_decision_is_a_noop() {
        let dispatcher = Arc::new(FailingDispatcher::new(0));
        let adapter = DispatcherAdapter::new(dispatcher.clone());
        let registry = ChainRegistry::quai_mainnet_all_enabled();
        let mut engine = SwitchDecisionEngine::new(0.05, Duration::from_secs(30));
        let mut history = SwitchHistory::default();

        let decision = Decision::Hold {
            reason: crate::optimizer::types::HoldReason::AlreadyOptimal,
        };
        let event = adapter
            .apply(&decision, 2_000, &registry, &mut engine, &mut history)
            .await;

        assert!(event.is_none());
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
        assert!(history.is_empty());
    }
}
