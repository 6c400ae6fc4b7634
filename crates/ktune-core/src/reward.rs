// REWARD SCORING
// R = ω1·TPS − ω2·OrphanRate − ω3·SecurityMargin
//
// The security margin penalizes k drifting away from the safe fraction of its range:
// too high weakens security, too low raises the orphan rate.

use serde::{Deserialize, Serialize};

use crate::observation::KBounds;

/// Fraction of the [k_min, k_max] range treated as the safe operating point.
pub const SAFE_K_FRACTION: f64 = 0.3;

/// Weights for the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    /// ω1: throughput weight
    pub tps: f64,
    /// ω2: orphan rate penalty weight
    pub orphan: f64,
    /// ω3: security margin penalty weight
    pub security: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        RewardWeights {
            tps: 1.0,
            orphan: 5.0,
            security: 0.5,
        }
    }
}

/// Weighted reward terms, kept separately for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardComponents {
    pub tps_reward: f64,
    pub orphan_penalty: f64,
    pub security_penalty: f64,
}

impl RewardComponents {
    pub fn compute(
        weights: &RewardWeights,
        tps: f64,
        orphan_rate: f64,
        k: u64,
        bounds: &KBounds,
    ) -> Self {
        RewardComponents {
            tps_reward: weights.tps * tps,
            orphan_penalty: weights.orphan * orphan_rate,
            security_penalty: weights.security * security_margin(k, bounds),
        }
    }

    /// Scalar reward.
    pub fn total(&self) -> f64 {
        self.tps_reward - self.orphan_penalty - self.security_penalty
    }
}

/// `|k_norm − 0.3|` where k_norm is k scaled into [0, 1] over the bounds.
pub fn security_margin(k: u64, bounds: &KBounds) -> f64 {
    (bounds.normalize(k) - SAFE_K_FRACTION).abs()
}
