//! RPC server: accepts connections and dispatches `Service.Method` calls.

use crate::error::RpcError;
use crate::message::{RpcRequest, RpcResponse};
use async_trait::async_trait;
use auxo_types::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use auxo_wire::codec::{read_frame, write_frame};
use auxo_wire::shutdown;
use auxo_wire::WireError;
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-call information handed to services.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    deadline: Instant,
}

impl CallContext {
    pub fn new(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the caller gives up.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// A named group of methods exposed by an [`RpcServer`].
#[async_trait]
pub trait RpcService: Send + Sync + 'static {
    /// Service name, the part of `Service.Method` before the dot.
    fn name(&self) -> &'static str;

    /// Handle `method` (the part after the dot).
    async fn call(&self, ctx: &CallContext, method: &str, params: Value)
        -> Result<Value, RpcError>;
}

type ServiceTable = HashMap<&'static str, Arc<dyn RpcService>>;

/// Listener plus the services it dispatches to.
pub struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    services: ServiceTable,
}

impl RpcServer {
    /// Bind the listener on `addr` (`host:port`).
    pub async fn bind(addr: &str) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "RPC server listening");
        Ok(Self {
            listener,
            local_addr,
            services: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register a service. A later service with the same name replaces it.
    pub fn add_service(&mut self, service: Arc<dyn RpcService>) -> &mut Self {
        let name = service.name();
        if self.services.insert(name, service).is_some() {
            warn!(service = name, "RPC service registered twice; keeping the latest");
        }
        self
    }

    /// Serve until `shutdown` fires. Open connections are dropped on exit.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), RpcError> {
        let services = Arc::new(self.services);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown::signalled(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "RPC connection accepted");
                        let services = Arc::clone(&services);
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(stream, &services).await {
                                debug!(%addr, error = %e, "RPC connection ended");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "RPC accept error");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(local_addr = %self.local_addr, "RPC server stopped");
        Ok(())
    }
}

/// Handle requests on one connection, one at a time, until it closes.
async fn serve_connection(stream: TcpStream, services: &ServiceTable) -> Result<(), WireError> {
    let _ = stream.set_nodelay(true);
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(WireError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        let response = match serde_json::from_slice::<RpcRequest>(&frame) {
            Ok(request) => dispatch(services, request).await,
            Err(e) => {
                warn!(error = %e, "Malformed RPC request");
                RpcResponse::from_result(String::new(), Err(RpcError::Codec(e)))
            }
        };

        let body = match serde_json::to_vec(&response) {
            Ok(body) => body,
            Err(e) => {
                error!(id = %response.id, error = %e, "Failed to encode RPC response");
                return Ok(());
            }
        };
        write_frame(&mut writer, &body).await?;
    }
}

async fn dispatch(services: &ServiceTable, request: RpcRequest) -> RpcResponse {
    let RpcRequest {
        id,
        method,
        deadline_ms,
        params,
    } = request;

    let budget = if deadline_ms == 0 {
        Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    } else {
        Duration::from_millis(deadline_ms)
    };
    let ctx = CallContext::new(Instant::now() + budget);

    let service = method
        .split_once('.')
        .and_then(|(service, name)| services.get(service).map(|s| (s, name)));

    let result = match service {
        Some((service, name)) => {
            debug!(%id, %method, "RPC call");
            match tokio::time::timeout_at(ctx.deadline(), service.call(&ctx, name, params)).await
            {
                Ok(result) => result,
                Err(_) => Err(RpcError::DeadlineExceeded(method.clone())),
            }
        }
        None => Err(RpcError::MethodNotFound(method.clone())),
    };

    if let Err(e) = &result {
        debug!(%id, %method, error = %e, "RPC call failed");
    }
    RpcResponse::from_result(id, result)
}
