// DECISION PROVIDERS
// The boundary between the controller and whatever picks the next k action.
//
// CONTRACT:
// decide(observation) -> (action in [0, 4], confidence in [0, 1])
// Output outside those ranges is a malformed-output error; the controller keeps its prior k.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use ktune_core::{KAction, Observation, SAFE_K_FRACTION};

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("decision provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed provider output: {0}")]
    Malformed(String),
}

/// A validated provider decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: KAction,
    pub confidence: f64,
}

impl Decision {
    /// Validate raw provider output.
    pub fn from_raw(action: i64, confidence: f64) -> Result<Self, DecisionError> {
        let action = KAction::from_index(action)
            .ok_or_else(|| DecisionError::Malformed(format!("action {action} outside [0, 4]")))?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DecisionError::Malformed(format!(
                "confidence {confidence} outside [0, 1]"
            )));
        }
        Ok(Decision { action, confidence })
    }
}

#[async_trait]
pub trait DecisionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, observation: &Observation) -> Result<Decision, DecisionError>;

    /// Startup reachability check. Providers without external state are always ready.
    async fn probe(&self) -> Result<(), DecisionError> {
        Ok(())
    }
}

/// Always returns the same decision.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    decision: Decision,
}

impl FixedPolicy {
    pub fn new(action: KAction, confidence: f64) -> Result<Self, DecisionError> {
        let decision = Decision::from_raw(action.index() as i64, confidence)?;
        Ok(FixedPolicy { decision })
    }

    /// Never moves k.
    pub fn hold() -> Self {
        FixedPolicy {
            decision: Decision {
                action: KAction::Hold,
                confidence: 1.0,
            },
        }
    }
}

#[async_trait]
impl DecisionProvider for FixedPolicy {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn decide(&self, _observation: &Observation) -> Result<Decision, DecisionError> {
        Ok(self.decision)
    }
}

/// Rule-based stand-in for a trained model.
///
/// Widens k under congestion (orphans, tip overshoot, latency) and otherwise drifts k back
/// toward the safe fraction of its range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicPolicy {
    /// Orphan rate above which k is widened
    pub orphan_high: f64,
    /// Tip velocity above which k is widened
    pub tip_velocity_high: f64,
    /// Normalized latency above which k is widened
    pub latency_high: f64,
    /// Distance from the safe fraction tolerated while calm
    pub dead_band: f64,
}

impl Default for HeuristicPolicy {
    fn default() -> Self {
        HeuristicPolicy {
            orphan_high: 0.1,
            tip_velocity_high: 1.0,
            latency_high: 0.6,
            dead_band: 0.05,
        }
    }
}

impl HeuristicPolicy {
    pub fn evaluate(&self, obs: &Observation) -> Decision {
        // how far past each threshold the network is, 1.0 = exactly at the threshold
        let pressure = (obs.orphan_rate / self.orphan_high)
            .max(obs.tip_velocity / self.tip_velocity_high)
            .max(obs.latency_norm / self.latency_high);

        if pressure >= 1.0 {
            if obs.k_norm >= 1.0 {
                return Decision {
                    action: KAction::Hold,
                    confidence: 0.5,
                };
            }
            let action = if pressure >= 2.0 {
                KAction::IncreaseTwo
            } else {
                KAction::IncreaseOne
            };
            return Decision {
                action,
                confidence: (0.5 + 0.25 * pressure).min(1.0),
            };
        }

        let drift = obs.k_norm - SAFE_K_FRACTION;
        if drift.abs() <= self.dead_band {
            return Decision {
                action: KAction::Hold,
                confidence: (1.0 - pressure).clamp(0.0, 1.0),
            };
        }

        let action = if drift > 0.0 {
            KAction::DecreaseOne
        } else {
            KAction::IncreaseOne
        };
        Decision {
            action,
            confidence: (0.5 + drift.abs()).min(1.0),
        }
    }
}

#[async_trait]
impl DecisionProvider for HeuristicPolicy {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn decide(&self, observation: &Observation) -> Result<Decision, DecisionError> {
        Ok(self.evaluate(observation))
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    observation: [f64; 4],
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    action: i64,
    confidence: f64,
}

/// HTTP inference endpoint serving a trained model.
#[derive(Debug, Clone)]
pub struct RemotePolicy {
    endpoint: String,
    http: reqwest::Client,
}

impl RemotePolicy {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DecisionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecisionError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(RemotePolicy {
            endpoint: endpoint.into(),
            http,
        })
    }

    async fn infer(&self, observation: [f64; 4]) -> Result<Decision, DecisionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&InferenceRequest { observation })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DecisionError::Unavailable(format!("{}: {e}", self.endpoint)))?;

        let body: InferenceResponse = response
            .json()
            .await
            .map_err(|e| DecisionError::Malformed(e.to_string()))?;

        debug!(action = body.action, confidence = body.confidence, "inference response");
        Decision::from_raw(body.action, body.confidence)
    }
}

#[async_trait]
impl DecisionProvider for RemotePolicy {
    fn name(&self) -> &str {
        "remote"
    }

    async fn decide(&self, observation: &Observation) -> Result<Decision, DecisionError> {
        self.infer(observation.to_vec()).await
    }

    async fn probe(&self) -> Result<(), DecisionError> {
        self.infer([0.0; 4]).await.map(|_| ())
    }
}
