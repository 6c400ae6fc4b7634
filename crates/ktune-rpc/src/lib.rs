pub mod api;
pub mod client;
pub mod envelope;
pub mod error;
pub mod schema;
pub mod submit;

pub use api::DagRpc;
pub use client::{ClientConfig, DagClient, DEFAULT_MAX_ATTEMPTS};
pub use envelope::{RpcErrorObject, RpcRequest, RpcResponse, JSONRPC_VERSION};
pub use error::{RpcError, RpcResult};
pub use schema::{
    AgentHealth, DagSnapshot, LinearizedBlock, SmartSubmitRequest, SmartSubmitResponse, TipInfo,
    UpdateKAck,
};
pub use submit::{submit_with_fallback, SubmitError, SubmitOutcome, SubmitSource};
