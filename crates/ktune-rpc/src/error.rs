use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the transport client.
///
/// `Transport`, `Timeout` and `Incomplete` are transport faults. `Remote` is a complete,
/// well-formed answer from the node and is never retried.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("cannot connect to {addr} after {attempts} attempts: {source}")]
    Transport {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to {addr}: {source}")]
    Io {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("call to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("{addr} closed the connection after {received} bytes without a complete response")]
    Incomplete { addr: String, received: usize },

    #[error("RPC error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("malformed response to {method}: {reason}")]
    Malformed { method: String, reason: String },

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RpcError {
    /// True for faults of the stream itself (unreachable, refused, timed out, cut short).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RpcError::Transport { .. }
                | RpcError::Io { .. }
                | RpcError::Timeout { .. }
                | RpcError::Incomplete { .. }
        )
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RpcError::Remote { .. })
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
