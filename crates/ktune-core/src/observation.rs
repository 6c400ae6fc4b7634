// OBSERVATION VECTOR
// Normalized four-element view of network conditions handed to a decision provider.
//
// INVARIANTS:
// 1. k_norm and latency_norm lie in [0, 1]
// 2. orphan_rate lies in [0, 1]
// 3. tip_velocity lies in [0, 10]
// 4. Non-finite inputs collapse to the lower bound of their range

use serde::{Deserialize, Serialize};

/// Dimension of the observation vector.
pub const OBS_DIM: usize = 4;

/// Latency (ms) that maps to a normalized latency of 1.0.
pub const LATENCY_SCALE_MS: f64 = 500.0;

/// Upper clamp for tip regression velocity.
pub const TIP_VELOCITY_MAX: f64 = 10.0;

/// Inclusive bounds on the k parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KBounds {
    pub k_min: u64,
    pub k_max: u64,
}

impl KBounds {
    pub fn new(k_min: u64, k_max: u64) -> Self {
        KBounds { k_min, k_max }
    }

    pub fn clamp(&self, k: u64) -> u64 {
        k.clamp(self.k_min, self.k_max)
    }

    /// Position of `k` in the bounded range, scaled to [0, 1].
    pub fn normalize(&self, k: u64) -> f64 {
        let span = self.k_max.saturating_sub(self.k_min).max(1) as f64;
        clamp_unit((k as f64 - self.k_min as f64) / span, 1.0)
    }
}

impl Default for KBounds {
    fn default() -> Self {
        KBounds { k_min: 1, k_max: 32 }
    }
}

/// Raw network metrics, from either the node or the dynamics model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    /// k currently enforced by the source.
    pub current_k: u64,
    /// Orphaned (or red) blocks over blocks created.
    pub orphan_rate: f64,
    /// How far the tip count overshoots the width k tolerates.
    pub tip_regression_velocity: f64,
    /// Average block propagation latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Blocks per second observed over the last window.
    pub tps: f64,
}

/// Normalized observation consumed by decision providers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub k_norm: f64,
    pub orphan_rate: f64,
    pub tip_velocity: f64,
    pub latency_norm: f64,
}

impl Observation {
    /// Build an observation from raw metrics, clamping every component to its range.
    pub fn from_metrics(metrics: &NetworkMetrics, bounds: &KBounds) -> Self {
        Observation {
            k_norm: bounds.normalize(metrics.current_k),
            orphan_rate: clamp_unit(metrics.orphan_rate, 1.0),
            tip_velocity: clamp_unit(metrics.tip_regression_velocity, TIP_VELOCITY_MAX),
            latency_norm: clamp_unit(metrics.avg_latency_ms / LATENCY_SCALE_MS, 1.0),
        }
    }

    /// Flat `[k_norm, orphan_rate, tip_velocity, latency_norm]` vector.
    pub fn to_vec(&self) -> [f64; OBS_DIM] {
        [self.k_norm, self.orphan_rate, self.tip_velocity, self.latency_norm]
    }
}

fn clamp_unit(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}
