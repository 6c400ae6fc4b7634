// DECISION CONFIDENCE TRACKING
// Rolling statistics over the confidence the provider reports, for observability only.
// Confidence never gates actuation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Decisions kept in the rolling window.
pub const CONFIDENCE_WINDOW: usize = 50;

#[derive(Debug, Clone)]
pub struct ConfidenceTracker {
    window: VecDeque<f64>,
    last: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    decisions: u64,
    committed_changes: u64,
}

/// Serializable view of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSnapshot {
    pub last: Option<f64>,
    /// Mean over the last `CONFIDENCE_WINDOW` decisions
    pub rolling_mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub decisions: u64,
    pub committed_changes: u64,
}

impl Default for ConfidenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidenceTracker {
    pub fn new() -> Self {
        ConfidenceTracker {
            window: VecDeque::with_capacity(CONFIDENCE_WINDOW),
            last: None,
            min: None,
            max: None,
            decisions: 0,
            committed_changes: 0,
        }
    }

    pub fn record_decision(&mut self, confidence: f64) {
        if self.window.len() == CONFIDENCE_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(confidence);
        self.last = Some(confidence);
        self.min = Some(self.min.map_or(confidence, |m| m.min(confidence)));
        self.max = Some(self.max.map_or(confidence, |m| m.max(confidence)));
        self.decisions += 1;
    }

    /// A k change took effect, remotely or locally.
    pub fn record_change(&mut self) {
        self.committed_changes += 1;
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn rolling_mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    pub fn snapshot(&self) -> ConfidenceSnapshot {
        ConfidenceSnapshot {
            last: self.last,
            rolling_mean: self.rolling_mean(),
            min: self.min,
            max: self.max,
            decisions: self.decisions,
            committed_changes: self.committed_changes,
        }
    }
}
