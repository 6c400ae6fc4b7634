// DAG NODE RPC CLIENT
// JSON-RPC 2.0 over a plain byte stream, one fresh connection per call.
//
// FRAMING INVARIANT:
// The wire carries no length prefix and no delimiter. The client accumulates bytes, attempts a
// parse after every chunk, keeps reading while the parse fails only for lack of input, and
// returns on the first complete document. A zero-byte read means the peer closed. The whole
// exchange is bounded by the per-call timeout.
//
// RETRY POLICY:
// 1. Only connection establishment is retried (up to `max_attempts`)
// 2. Backoff is linear: attempt index × `retry_base_delay`
// 3. A well-formed error response is an answer, not a fault, and is never retried

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use ktune_core::KtuneConfig;

use crate::api::DagRpc;
use crate::envelope::{RpcRequest, RpcResponse};
use crate::error::{RpcError, RpcResult};
use crate::schema::{
    AgentHealth, DagSnapshot, LinearizedBlock, SmartSubmitRequest, SmartSubmitResponse, TipInfo,
    UpdateKAck,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Deadline per connect attempt and for the request/response exchange
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "localhost".to_string(),
            port: 9293,
            timeout: Duration::from_secs(5),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl ClientConfig {
    pub fn from_config(config: &KtuneConfig) -> Self {
        ClientConfig {
            host: config.rpc_host.clone(),
            port: config.rpc_port,
            timeout: config.rpc_timeout(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: config.rpc_retry_base(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// JSON-RPC client for the node. Holds no connection between calls.
#[derive(Debug)]
pub struct DagClient {
    config: ClientConfig,
    next_id: AtomicU64,
}

impl DagClient {
    pub fn new(config: ClientConfig) -> Self {
        DagClient {
            config,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Send one request and return its result payload.
    pub async fn call(&self, method: &str, params: Option<Value>) -> RpcResult<Value> {
        let id = self.next_id();
        let payload = serde_json::to_vec(&RpcRequest::new(method, params, id))?;
        let addr = self.config.addr();

        debug!(%addr, method, id, "rpc call");
        let mut stream = self.connect(&addr).await?;

        let exchange = async {
            stream
                .write_all(&payload)
                .await
                .map_err(|source| RpcError::Io {
                    addr: addr.clone(),
                    source,
                })?;
            read_document(&mut stream, &addr, method).await
        };

        let outcome = timeout(self.config.timeout, exchange).await;
        let document = match outcome {
            Ok(result) => result?,
            Err(_) => {
                return Err(RpcError::Timeout {
                    addr,
                    timeout: self.config.timeout,
                })
            }
        };

        let response: RpcResponse = decode(method, document)?;
        response.into_result().map_err(|err| {
            debug!(method, code = err.code, message = %err.message, "remote error");
            RpcError::Remote {
                code: err.code,
                message: err.message,
            }
        })
    }

    async fn connect(&self, addr: &str) -> RpcResult<TcpStream> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            let result = match timeout(self.config.timeout, TcpStream::connect(addr)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            };

            match result {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    warn!(%addr, attempt, attempts, error = %e, "connect failed");
                    last_err = Some(e);
                    if attempt < attempts {
                        sleep(self.config.retry_base_delay * attempt).await;
                    }
                }
            }
        }

        Err(RpcError::Transport {
            addr: addr.to_string(),
            attempts,
            source: last_err
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no connect attempt")),
        })
    }
}

/// Read until the accumulated bytes form one complete JSON document.
pub(crate) async fn read_document<S>(stream: &mut S, addr: &str, method: &str) -> RpcResult<Value>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|source| RpcError::Io {
                addr: addr.to_string(),
                source,
            })?;
        if n == 0 {
            return Err(RpcError::Incomplete {
                addr: addr.to_string(),
                received: buf.len(),
            });
        }
        buf.extend_from_slice(&chunk[..n]);
        trace!(%addr, chunk = n, total = buf.len(), "read chunk");

        match serde_json::from_slice::<Value>(&buf) {
            Ok(document) => return Ok(document),
            Err(e) if e.is_eof() => continue,
            Err(e) => {
                return Err(RpcError::Malformed {
                    method: method.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> RpcResult<T> {
    serde_json::from_value(value).map_err(|e| RpcError::Malformed {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl DagRpc for DagClient {
    async fn get_tips(&self) -> RpcResult<Vec<TipInfo>> {
        let value = self.call("get_tips", None).await?;
        decode("get_tips", value)
    }

    async fn get_health(&self) -> RpcResult<AgentHealth> {
        let value = self.call("get_health", None).await?;
        decode("get_health", value)
    }

    async fn get_snapshot(&self, n: usize) -> RpcResult<DagSnapshot> {
        let value = self.call("get_snapshot", Some(json!({ "n": n }))).await?;
        decode("get_snapshot", value)
    }

    async fn update_k(&self, new_k: u64) -> RpcResult<UpdateKAck> {
        let value = self.call("update_k", Some(json!({ "new_k": new_k }))).await?;
        if value.is_null() {
            return Err(RpcError::Malformed {
                method: "update_k".to_string(),
                reason: "empty acknowledgement".to_string(),
            });
        }
        let ack: UpdateKAck = if value.is_object() {
            decode("update_k", value)?
        } else {
            UpdateKAck::default()
        };
        match ack.updated_k {
            Some(k) if k != new_k => Err(RpcError::Malformed {
                method: "update_k".to_string(),
                reason: format!("node acknowledged k={k}, requested {new_k}"),
            }),
            _ => Ok(ack),
        }
    }

    async fn smart_submit(&self, request: &SmartSubmitRequest) -> RpcResult<SmartSubmitResponse> {
        let params = serde_json::to_value(request)?;
        let value = self.call("smart_submit", Some(params)).await?;
        decode("smart_submit", value)
    }

    async fn get_tip_order(&self) -> RpcResult<Vec<LinearizedBlock>> {
        let value = self.call("get_tip_order", None).await?;
        decode("get_tip_order", value)
    }

    async fn linearize_range(
        &self,
        from_score: u64,
        to_score: u64,
    ) -> RpcResult<Vec<LinearizedBlock>> {
        let params = json!({ "from_score": from_score, "to_score": to_score });
        let value = self.call("linearize_range", Some(params)).await?;
        decode("linearize_range", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_read_document_across_chunks() {
        let (mut client, mut server) = duplex(8);
        let body = br#"{"jsonrpc":"2.0","result":{"current_k":7},"id":1}"#.to_vec();

        let writer = tokio::spawn(async move {
            for piece in body.chunks(5) {
                server.write_all(piece).await.unwrap();
                tokio::task::yield_now().await;
            }
            // keep the pipe open; the reader must stop on the parse, not on close
            server
        });

        let doc = read_document(&mut client, "duplex", "get_health").await.unwrap();
        assert_eq!(doc["result"]["current_k"], 7);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_document_peer_close_is_incomplete() {
        let (mut client, mut server) = duplex(64);
        let partial = br#"{"jsonrpc":"2.0","res"#;
        server.write_all(partial).await.unwrap();
        drop(server);

        let err = read_document(&mut client, "duplex", "get_tips").await.unwrap_err();
        match &err {
            RpcError::Incomplete { received, .. } => assert_eq!(*received, partial.len()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_read_document_rejects_garbage() {
        let (mut client, mut server) = duplex(64);
        server.write_all(b"HTTP/1.1 400 Bad Request\r\n").await.unwrap();

        let err = read_document(&mut client, "duplex", "get_tips").await.unwrap_err();
        assert!(matches!(err, RpcError::Malformed { .. }));
    }

    #[test]
    fn test_request_ids_increase_per_client() {
        let client = DagClient::new(ClientConfig::default());
        assert_eq!(client.next_id(), 1);
        assert_eq!(client.next_id(), 2);

        let other = DagClient::new(ClientConfig::default());
        assert_eq!(other.next_id(), 1);
    }

    #[test]
    fn test_client_config_from_ktune_config() {
        let config = KtuneConfig {
            rpc_host: "10.0.0.5".to_string(),
            rpc_port: 9999,
            rpc_timeout_ms: 250,
            rpc_retry_base_ms: 20,
            ..KtuneConfig::default()
        };
        let client_config = ClientConfig::from_config(&config);
        assert_eq!(client_config.addr(), "10.0.0.5:9999");
        assert_eq!(client_config.timeout, Duration::from_millis(250));
        assert_eq!(client_config.retry_base_delay, Duration::from_millis(20));
        assert_eq!(client_config.max_attempts, 3);
    }
}
