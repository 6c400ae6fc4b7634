use async_trait::async_trait;

use crate::error::RpcResult;
use crate::schema::{
    AgentHealth, DagSnapshot, LinearizedBlock, SmartSubmitRequest, SmartSubmitResponse, TipInfo,
    UpdateKAck,
};

/// Typed view of the node's RPC surface.
///
/// `DagClient` implements it over the wire; the controller and the submission path
/// only see this trait, so tests can substitute a mock node.
#[async_trait]
pub trait DagRpc: Send + Sync {
    /// Current DAG tips with blue scores.
    async fn get_tips(&self) -> RpcResult<Vec<TipInfo>>;

    /// k, confidence, agent state and coloring counters.
    async fn get_health(&self) -> RpcResult<AgentHealth>;

    /// Last `n` linearized blocks.
    async fn get_snapshot(&self, n: usize) -> RpcResult<DagSnapshot>;

    /// Hot-swap the node's k without a restart.
    async fn update_k(&self, new_k: u64) -> RpcResult<UpdateKAck>;

    /// Submit a transaction and let the node pick its parents.
    async fn smart_submit(&self, request: &SmartSubmitRequest) -> RpcResult<SmartSubmitResponse>;

    /// Full total ordering of the DAG.
    async fn get_tip_order(&self) -> RpcResult<Vec<LinearizedBlock>>;

    /// Blocks whose blue score lies in `[from_score, to_score]`.
    async fn linearize_range(
        &self,
        from_score: u64,
        to_score: u64,
    ) -> RpcResult<Vec<LinearizedBlock>>;
}
