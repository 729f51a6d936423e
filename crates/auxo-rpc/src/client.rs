//! RPC client with per-call deadlines.

use crate::error::RpcError;
use crate::message::{RpcRequest, RpcResponse};
use auxo_wire::codec::{read_frame, write_frame};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

struct Connection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(address: &str) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| RpcError::Unavailable(format!("{address}: {e}")))?;
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Ok(Self { reader, writer })
    }
}

/// Client for one RPC server.
///
/// Connects lazily and keeps the connection for later calls. Calls are
/// serialized over that connection; any failure drops it so the next call
/// reconnects.
pub struct RpcClient {
    address: String,
    default_deadline: Duration,
    connection: Mutex<Option<Connection>>,
}

impl RpcClient {
    pub fn new(address: impl Into<String>, default_deadline: Duration) -> Self {
        Self {
            address: address.into(),
            default_deadline,
            connection: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// Call `method` with the default deadline.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with_deadline(method, params, self.default_deadline)
            .await
    }

    /// Call `method`, giving up after `deadline`.
    pub async fn call_with_deadline(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, RpcError> {
        let started = Instant::now();
        let mut slot = tokio::time::timeout(deadline, self.connection.lock())
            .await
            .map_err(|_| RpcError::DeadlineExceeded(method.to_string()))?;

        // The server only gets what is left after queueing for the connection.
        let remaining = deadline.saturating_sub(started.elapsed());
        let request = RpcRequest {
            id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            deadline_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX).max(1),
            params,
        };
        let body = serde_json::to_vec(&request)?;

        match tokio::time::timeout(
            remaining,
            exchange(&self.address, &mut slot, &body, &request.id),
        )
        .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                *slot = None;
                Err(e)
            }
            Err(_) => {
                *slot = None;
                Err(RpcError::DeadlineExceeded(method.to_string()))
            }
        }
    }

    /// Typed wrapper over [`RpcClient::call_with_deadline`].
    pub async fn invoke<Req, Resp>(
        &self,
        method: &str,
        request: &Req,
        deadline: Duration,
    ) -> Result<Resp, RpcError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let params = serde_json::to_value(request)?;
        let result = self.call_with_deadline(method, params, deadline).await?;
        Ok(serde_json::from_value(result)?)
    }
}

async fn exchange(
    address: &str,
    slot: &mut Option<Connection>,
    body: &[u8],
    id: &str,
) -> Result<Value, RpcError> {
    if slot.is_none() {
        *slot = Some(Connection::open(address).await?);
    }
    let Some(conn) = slot.as_mut() else {
        return Err(RpcError::Unavailable(address.to_string()));
    };

    write_frame(&mut conn.writer, body).await?;
    loop {
        let frame = read_frame(&mut conn.reader).await?;
        let response: RpcResponse = serde_json::from_slice(&frame)?;
        if response.id == id {
            return response.into_result();
        }
        debug!(expected = %id, got = %response.id, "Discarding stale RPC response");
    }
}
