// ADAPTIVE K CONTROLLER
// One cycle: observe metrics -> build observation -> ask the provider -> clamp and commit k.
//
// PHASES:
// Idle -> Observing -> Deciding -> Actuating -> Idle
// There is no failed phase. A failing cycle is reported and the loop continues.
//
// SAFETY INVARIANTS:
// 1. k always stays inside [k_min, k_max] after actuation
// 2. With a node configured, k changes locally only after the node acknowledged it
// 3. Cycles never overlap; the stop flag is honoured only between cycles

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ktune_core::{
    KAction, KBounds, KtuneConfig, NetworkMetrics, Observation, RewardComponents, RewardWeights,
};
use ktune_rpc::{DagRpc, RpcError};
use ktune_sim::DagSimulator;

use crate::confidence::{ConfidenceSnapshot, ConfidenceTracker};
use crate::decision::{Decision, DecisionError, DecisionProvider};
use crate::notify::NodeNotifier;

/// Consecutive no-change cycles between stability log lines.
pub const STABILITY_LOG_EVERY: u64 = 10;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to observe node metrics: {0}")]
    Observe(#[source] RpcError),

    #[error("decision failed: {0}")]
    Decision(#[from] DecisionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerPhase {
    Idle,
    Observing,
    Deciding,
    Actuating,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActuationOutcome {
    /// Clamped k equals the current k; the node was not contacted
    Unchanged,
    /// The node acknowledged the new k
    Committed,
    /// No node configured; the new k went straight into the model
    AppliedLocally,
    /// The node refused or could not be reached; the prior k is kept
    CommitFailed(String),
}

/// Where the controller reads its metrics from.
pub enum MetricsSource {
    /// Health and tips queried from the node
    Live(Arc<dyn DagRpc>),
    /// Batches run on an in-process dynamics model
    Simulated(DagSimulator),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub bounds: KBounds,
    pub weights: RewardWeights,
    pub initial_k: u64,
    pub poll_interval: Duration,
    pub blocks_per_cycle: usize,
    pub base_latency_ms: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig::from_config(&KtuneConfig::default())
    }
}

impl ControllerConfig {
    pub fn from_config(config: &KtuneConfig) -> Self {
        ControllerConfig {
            bounds: config.k_bounds(),
            weights: config.reward_weights(),
            initial_k: config.initial_k,
            poll_interval: config.poll_interval(),
            blocks_per_cycle: config.blocks_per_cycle,
            base_latency_ms: config.base_latency_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    /// Authoritative local copy of k
    pub current_k: u64,
    pub last_confidence: Option<f64>,
    /// Consecutive cycles that left k unchanged
    pub no_change_cycles: u64,
    pub phase: ControllerPhase,
    /// Cycles started, including failed ones
    pub cycles: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub metrics: NetworkMetrics,
    pub observation: Observation,
    pub decision: Decision,
    pub previous_k: u64,
    pub new_k: u64,
    pub outcome: ActuationOutcome,
    /// Scored at the k the metrics were observed under
    pub components: RewardComponents,
    pub score: f64,
}

pub struct KController {
    config: ControllerConfig,
    provider: Arc<dyn DecisionProvider>,
    source: MetricsSource,
    /// Node that must acknowledge k changes, if any
    authority: Option<Arc<dyn DagRpc>>,
    notifier: NodeNotifier,
    state: ControllerState,
    confidence: ConfidenceTracker,
    /// (total_blocks, when) from the previous live observation
    last_block_count: Option<(u64, Instant)>,
}

impl KController {
    /// Controller driven entirely by a remote node.
    pub fn live(
        config: ControllerConfig,
        provider: Arc<dyn DecisionProvider>,
        rpc: Arc<dyn DagRpc>,
        notifier: NodeNotifier,
    ) -> Self {
        Self::new(
            config,
            provider,
            MetricsSource::Live(rpc.clone()),
            Some(rpc),
            notifier,
        )
    }

    /// Controller fed by a dynamics model. With `authority` set, k changes are still committed
    /// to the node before the model adopts them.
    pub fn simulated(
        config: ControllerConfig,
        provider: Arc<dyn DecisionProvider>,
        mut sim: DagSimulator,
        authority: Option<Arc<dyn DagRpc>>,
        notifier: NodeNotifier,
    ) -> Self {
        sim.reset(config.bounds.clamp(config.initial_k));
        Self::new(
            config,
            provider,
            MetricsSource::Simulated(sim),
            authority,
            notifier,
        )
    }

    fn new(
        config: ControllerConfig,
        provider: Arc<dyn DecisionProvider>,
        source: MetricsSource,
        authority: Option<Arc<dyn DagRpc>>,
        notifier: NodeNotifier,
    ) -> Self {
        let current_k = config.bounds.clamp(config.initial_k);
        KController {
            config,
            provider,
            source,
            authority,
            notifier,
            state: ControllerState {
                current_k,
                last_confidence: None,
                no_change_cycles: 0,
                phase: ControllerPhase::Idle,
                cycles: 0,
            },
            confidence: ConfidenceTracker::new(),
            last_block_count: None,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn current_k(&self) -> u64 {
        self.state.current_k
    }

    pub fn confidence(&self) -> ConfidenceSnapshot {
        self.confidence.snapshot()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one full cycle. The controller is back in `Idle` afterwards, whatever the result.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.state.cycles += 1;
        let result = self.cycle().await;
        self.state.phase = ControllerPhase::Idle;
        result
    }

    /// Run cycles until `stop` turns true, pausing `poll_interval` between them.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) {
        info!(
            provider = self.provider.name(),
            k = self.state.current_k,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "k controller started"
        );

        while !*stop.borrow() {
            match self.run_cycle().await {
                Ok(report) => debug!(
                    cycle = report.cycle,
                    k = report.new_k,
                    score = report.score,
                    "cycle complete"
                ),
                Err(e) => warn!(cycle = self.state.cycles, error = %e, "cycle failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            cycles = self.state.cycles,
            k = self.state.current_k,
            "k controller stopped"
        );
    }

    async fn cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.state.phase = ControllerPhase::Observing;
        let metrics = self.observe().await?;
        let observation = Observation::from_metrics(&metrics, &self.config.bounds);

        self.state.phase = ControllerPhase::Deciding;
        let decision = self.provider.decide(&observation).await?;
        self.state.last_confidence = Some(decision.confidence);
        self.confidence.record_decision(decision.confidence);

        self.state.phase = ControllerPhase::Actuating;
        let previous_k = self.state.current_k;
        let outcome = self.actuate(decision.action).await;

        let components = RewardComponents::compute(
            &self.config.weights,
            metrics.tps,
            metrics.orphan_rate,
            previous_k,
            &self.config.bounds,
        );

        Ok(CycleReport {
            cycle: self.state.cycles,
            metrics,
            observation,
            decision,
            previous_k,
            new_k: self.state.current_k,
            outcome,
            score: components.total(),
            components,
        })
    }

    async fn observe(&mut self) -> Result<NetworkMetrics, CycleError> {
        match &mut self.source {
            MetricsSource::Simulated(sim) => {
                let batch =
                    sim.simulate_blocks(self.config.blocks_per_cycle, self.config.base_latency_ms);
                Ok(batch.to_network_metrics(self.state.current_k))
            }
            MetricsSource::Live(rpc) => {
                let health = rpc.get_health().await.map_err(CycleError::Observe)?;
                let current_k = health.current_k;

                let tip_regression_velocity = match rpc.get_tips().await {
                    Ok(tips) => {
                        (tips.len() as f64 - current_k as f64).max(0.0) / current_k.max(1) as f64
                    }
                    Err(e) => {
                        debug!(error = %e, "get_tips failed, tip velocity treated as 0");
                        0.0
                    }
                };

                let now = Instant::now();
                let tps = match self.last_block_count {
                    Some((prev, at)) => {
                        let elapsed = now.duration_since(at).as_secs_f64();
                        if elapsed > 0.0 {
                            health.total_blocks.saturating_sub(prev) as f64 / elapsed
                        } else {
                            0.0
                        }
                    }
                    None => 0.0,
                };
                self.last_block_count = Some((health.total_blocks, now));

                if current_k != self.state.current_k {
                    debug!(local = self.state.current_k, node = current_k, "reconciled k from node");
                    self.state.current_k = current_k;
                }

                Ok(NetworkMetrics {
                    current_k,
                    orphan_rate: health.red_ratio(),
                    tip_regression_velocity,
                    avg_latency_ms: self.config.base_latency_ms,
                    tps,
                })
            }
        }
    }

    async fn actuate(&mut self, action: KAction) -> ActuationOutcome {
        let bounds = self.config.bounds;
        let current_k = self.state.current_k;
        let new_k = action.apply(current_k, bounds.k_min, bounds.k_max);

        if new_k == current_k {
            self.state.no_change_cycles += 1;
            if self.state.no_change_cycles % STABILITY_LOG_EVERY == 0 {
                info!(
                    k = current_k,
                    cycles = self.state.no_change_cycles,
                    "k stable"
                );
            }
            return ActuationOutcome::Unchanged;
        }

        let outcome = match &self.authority {
            Some(rpc) => match rpc.update_k(new_k).await {
                Ok(_) => {
                    info!(k = current_k, new_k, action = %action, "k committed to node");
                    ActuationOutcome::Committed
                }
                Err(e) => {
                    warn!(k = current_k, new_k, error = %e, "k commit failed, keeping current k");
                    return ActuationOutcome::CommitFailed(e.to_string());
                }
            },
            None => {
                info!(k = current_k, new_k, action = %action, "k applied locally");
                ActuationOutcome::AppliedLocally
            }
        };

        self.state.current_k = new_k;
        self.state.no_change_cycles = 0;
        self.confidence.record_change();
        if let MetricsSource::Simulated(sim) = &mut self.source {
            sim.set_k(new_k);
        }
        if outcome == ActuationOutcome::Committed {
            self.notifier.notify();
        }
        outcome
    }
}
