// KTUNE CONFIGURATION
// Flat scalar configuration shared by the daemon, the CLI and the simulation harness.
//
// Layering (lowest precedence first):
// 1. Built-in defaults (serde `default`)
// 2. Optional config file (TOML / YAML / JSON, chosen by extension)
// 3. KTUNE_* environment variables
// CLI flags are applied on top by the binaries.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::observation::KBounds;
use crate::reward::RewardWeights;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KtuneConfig {
    /// Node RPC host
    pub rpc_host: String,

    /// Node RPC port
    pub rpc_port: u16,

    /// Per-call deadline covering connect, send and the read loop
    pub rpc_timeout_ms: u64,

    /// Base delay of the linear connect backoff
    pub rpc_retry_base_ms: u64,

    pub k_min: u64,
    pub k_max: u64,

    /// k assumed before the first reconciliation with the node
    pub initial_k: u64,

    /// Pause between control cycles
    pub poll_interval_ms: u64,

    /// ω1
    pub omega_tps: f64,
    /// ω2
    pub omega_orphan: f64,
    /// ω3
    pub omega_security: f64,

    /// Blocks simulated per cycle / env step
    pub blocks_per_cycle: usize,

    /// Mean simulated block latency
    pub base_latency_ms: f64,

    /// Episode length for the simulation env
    pub max_steps: u64,

    /// Node process to signal after a committed k change
    pub node_pid: Option<i32>,

    /// HTTP inference endpoint for the remote decision provider
    pub policy_endpoint: Option<String>,

    /// Seed for the dynamics model RNG
    pub seed: Option<u64>,
}

impl Default for KtuneConfig {
    fn default() -> Self {
        KtuneConfig {
            rpc_host: "localhost".to_string(),
            rpc_port: 9293,
            rpc_timeout_ms: 5_000,
            rpc_retry_base_ms: 500,
            k_min: 1,
            k_max: 32,
            initial_k: 3,
            poll_interval_ms: 5_000,
            omega_tps: 1.0,
            omega_orphan: 5.0,
            omega_security: 0.5,
            blocks_per_cycle: 10,
            base_latency_ms: 50.0,
            max_steps: 500,
            node_pid: None,
            policy_endpoint: None,
            seed: None,
        }
    }
}

impl KtuneConfig {
    /// Load defaults, an optional file and `KTUNE_*` environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix("KTUNE").try_parsing(true));

        let config: KtuneConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(file = ?path, k_min = config.k_min, k_max = config.k_max, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k_min < 1 {
            return Err(ConfigError::Invalid("k_min must be at least 1".to_string()));
        }
        if self.k_min > self.k_max {
            return Err(ConfigError::Invalid(format!(
                "k_min ({}) exceeds k_max ({})",
                self.k_min, self.k_max
            )));
        }
        if !(self.k_min..=self.k_max).contains(&self.initial_k) {
            return Err(ConfigError::Invalid(format!(
                "initial_k ({}) outside [{}, {}]",
                self.initial_k, self.k_min, self.k_max
            )));
        }
        if self.poll_interval_ms == 0 || self.rpc_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll interval and rpc timeout must be positive".to_string(),
            ));
        }
        if self.blocks_per_cycle == 0 {
            return Err(ConfigError::Invalid("blocks_per_cycle must be positive".to_string()));
        }
        if !self.base_latency_ms.is_finite() || self.base_latency_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "base_latency_ms must be finite and non-negative, got {}",
                self.base_latency_ms
            )));
        }
        Ok(())
    }

    pub fn k_bounds(&self) -> KBounds {
        KBounds::new(self.k_min, self.k_max)
    }

    pub fn reward_weights(&self) -> RewardWeights {
        RewardWeights {
            tps: self.omega_tps,
            orphan: self.omega_orphan,
            security: self.omega_security,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn rpc_retry_base(&self) -> Duration {
        Duration::from_millis(self.rpc_retry_base_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
