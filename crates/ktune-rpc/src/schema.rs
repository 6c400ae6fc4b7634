// NODE RPC SCHEMA
// Typed results for every method the node exposes. Payloads are validated against these
// types at the transport boundary before anything downstream sees them.

use ktune_core::ScoredTip;
use serde::{Deserialize, Serialize};

/// A DAG tip as reported by `get_tips`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TipInfo {
    /// Block hash (hex-encoded)
    pub hash: String,
    pub blue_score: u64,
}

impl ScoredTip for TipInfo {
    type Id = String;

    fn tip_id(&self) -> &String {
        &self.hash
    }

    fn blue_score(&self) -> u64 {
        self.blue_score
    }
}

/// Node agent status returned by `get_health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    /// k currently enforced by the node
    pub current_k: u64,

    /// Confidence the node last recorded for its k (0.0 to 1.0)
    pub rl_confidence: f64,

    /// SYNCED, DRIFTING, RECOVERING, PARTITIONED, ...
    pub agent_state: String,

    pub tip_blue_score: u64,
    pub total_blocks: u64,
    pub blue_count: u64,
    pub red_count: u64,
}

impl AgentHealth {
    /// Red blocks over all blocks, with the denominator floored at 1.
    pub fn red_ratio(&self) -> f64 {
        self.red_count as f64 / self.total_blocks.max(1) as f64
    }
}

/// One block of the linearized total order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearizedBlock {
    pub hash: String,
    pub blue_score: u64,

    /// Cumulative blue work (decimal string)
    pub blue_work: String,

    /// Position in the total ordering
    pub topological_index: u64,

    /// Parent hashes
    pub adjacency_list: Vec<String>,

    pub is_blue: bool,

    #[serde(default)]
    pub selected_parent: Option<String>,
}

/// Sub-graph of the last N blocks, returned by `get_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagSnapshot {
    pub blocks: Vec<LinearizedBlock>,
    pub total_blocks: u64,
    pub k: u64,
    pub tip: String,

    /// ms since epoch
    pub generated_at: u64,
}

/// Acknowledgement of `update_k`. Older nodes return an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateKAck {
    #[serde(default)]
    pub updated_k: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartSubmitRequest {
    /// Opaque transaction payload (hex-encoded)
    pub payload: String,
    pub parent_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartSubmitResponse {
    pub accepted: bool,
    pub selected_parents: Vec<String>,
    pub parent_blue_scores: Vec<u64>,

    /// Suggested block timestamp (ms since epoch)
    pub suggested_timestamp: u64,
}
