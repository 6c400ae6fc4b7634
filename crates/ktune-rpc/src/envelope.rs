// JSON-RPC 2.0 ENVELOPE
// One request document per connection; the response is the next complete document read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: u64,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, params: Option<Value>, id: u64) -> Self {
        RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
        }
    }
}

/// Structured error carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcResponse {
    /// Split into the result payload or the remote error. A missing result reads as `null`.
    pub fn into_result(self) -> Result<Value, RpcErrorObject> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
