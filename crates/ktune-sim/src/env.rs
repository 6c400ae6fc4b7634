// GHOSTDAG K-TUNING ENVIRONMENT
// Episodic harness over the dynamics model: each step applies one k action, simulates a batch
// and scores it.
//
// Reward: R = ω1·TPS − ω2·OrphanRate − ω3·SecurityMargin
//
// Episodes never terminate early; they are truncated at `max_steps`.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use ktune_core::{KAction, KBounds, KtuneConfig, Observation, RewardComponents, RewardWeights};

use crate::dag_sim::{DagSimulator, SimMetrics};

/// Steps retained for the rolling k statistics.
pub const K_HISTORY_WINDOW: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    pub initial_k: u64,
    pub bounds: KBounds,
    pub blocks_per_step: usize,
    pub max_steps: u64,
    pub weights: RewardWeights,
    pub base_latency: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            initial_k: 3,
            bounds: KBounds::default(),
            blocks_per_step: 10,
            max_steps: 500,
            weights: RewardWeights::default(),
            base_latency: 50.0,
        }
    }
}

impl EnvConfig {
    pub fn from_config(config: &KtuneConfig) -> Self {
        EnvConfig {
            initial_k: config.initial_k,
            bounds: config.k_bounds(),
            blocks_per_step: config.blocks_per_cycle,
            max_steps: config.max_steps,
            weights: config.reward_weights(),
            base_latency: config.base_latency_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    /// Step budget exhausted
    pub truncated: bool,
    pub metrics: SimMetrics,
    /// k in force for the simulated batch
    pub k: u64,
    pub components: RewardComponents,
}

/// Episode statistics for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSummary {
    pub steps: u64,
    pub final_k: u64,
    /// Mean k over the last `K_HISTORY_WINDOW` steps
    pub mean_k: f64,
    pub min_k: u64,
    pub max_k: u64,
    pub total_reward: f64,
    pub blue_count: u64,
    pub red_count: u64,
    pub orphan_count: u64,
}

pub struct GhostDagEnv<R = ChaCha8Rng> {
    config: EnvConfig,
    sim: DagSimulator<R>,
    current_step: u64,
    current_k: u64,
    k_history: VecDeque<u64>,
    min_k: u64,
    max_k: u64,
    total_reward: f64,
}

impl GhostDagEnv<ChaCha8Rng> {
    pub fn with_seed(config: EnvConfig, seed: u64) -> Self {
        let sim = DagSimulator::with_seed(config.initial_k, seed);
        Self::new(config, sim)
    }
}

impl<R: Rng> GhostDagEnv<R> {
    pub fn new(config: EnvConfig, sim: DagSimulator<R>) -> Self {
        let initial_k = config.bounds.clamp(config.initial_k);
        GhostDagEnv {
            config,
            sim,
            current_step: 0,
            current_k: initial_k,
            k_history: VecDeque::with_capacity(K_HISTORY_WINDOW),
            min_k: initial_k,
            max_k: initial_k,
            total_reward: 0.0,
        }
    }

    pub fn current_k(&self) -> u64 {
        self.current_k
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn simulator(&self) -> &DagSimulator<R> {
        &self.sim
    }

    /// Start a new episode at `initial_k` and warm the model up with one batch.
    pub fn reset(&mut self) -> (Observation, SimMetrics) {
        self.current_k = self.config.bounds.clamp(self.config.initial_k);
        self.current_step = 0;
        self.k_history.clear();
        self.min_k = self.current_k;
        self.max_k = self.current_k;
        self.total_reward = 0.0;

        self.sim.reset(self.current_k);
        let metrics = self
            .sim
            .simulate_blocks(self.config.blocks_per_step, self.config.base_latency);

        debug!(k = self.current_k, tips = metrics.tip_count, "environment reset");
        (self.observe(&metrics), metrics)
    }

    pub fn step(&mut self, action: KAction) -> StepOutcome {
        self.current_step += 1;

        let bounds = self.config.bounds;
        self.current_k = action.apply(self.current_k, bounds.k_min, bounds.k_max);
        self.sim.set_k(self.current_k);

        let metrics = self
            .sim
            .simulate_blocks(self.config.blocks_per_step, self.config.base_latency);

        let components = RewardComponents::compute(
            &self.config.weights,
            metrics.tps,
            metrics.orphan_rate,
            self.current_k,
            &bounds,
        );
        let reward = components.total();
        self.record(reward);

        StepOutcome {
            observation: self.observe(&metrics),
            reward,
            truncated: self.current_step >= self.config.max_steps,
            metrics,
            k: self.current_k,
            components,
        }
    }

    pub fn summary(&self) -> EnvSummary {
        let mean_k = if self.k_history.is_empty() {
            self.current_k as f64
        } else {
            self.k_history.iter().sum::<u64>() as f64 / self.k_history.len() as f64
        };

        EnvSummary {
            steps: self.current_step,
            final_k: self.current_k,
            mean_k,
            min_k: self.min_k,
            max_k: self.max_k,
            total_reward: self.total_reward,
            blue_count: self.sim.blue_count(),
            red_count: self.sim.red_count(),
            orphan_count: self.sim.orphan_count(),
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "step {:4} | k={:2} | tips={:3} | blue={} red={} | orphans={}",
            self.current_step,
            self.current_k,
            self.sim.tips().len(),
            self.sim.blue_count(),
            self.sim.red_count(),
            self.sim.orphan_count()
        )
    }

    fn observe(&self, metrics: &SimMetrics) -> Observation {
        Observation::from_metrics(
            &metrics.to_network_metrics(self.current_k),
            &self.config.bounds,
        )
    }

    fn record(&mut self, reward: f64) {
        if self.k_history.len() == K_HISTORY_WINDOW {
            self.k_history.pop_front();
        }
        self.k_history.push_back(self.current_k);
        self.min_k = self.min_k.min(self.current_k);
        self.max_k = self.max_k.max(self.current_k);
        self.total_reward += reward;
    }
}
