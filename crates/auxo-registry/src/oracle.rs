//! Oracle backend: answers `OracleBackendService` calls from a registry.

use crate::registry::RegistryHandle;
use async_trait::async_trait;
use auxo_rpc::{
    CallContext, CheckServiceExistsRequest, CheckServiceExistsResponse, OracleService,
    OracleServiceServer, RpcError, RpcServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub struct OracleBackend {
    registry: RegistryHandle,
}

impl OracleBackend {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl OracleService for OracleBackend {
    async fn check_service_exists(
        &self,
        _ctx: &CallContext,
        request: CheckServiceExistsRequest,
    ) -> Result<CheckServiceExistsResponse, RpcError> {
        let exists = self.registry.exists(&request.service_name);
        debug!(service = %request.service_name, exists, "CheckServiceExists");
        Ok(CheckServiceExistsResponse { exists })
    }
}

/// Bind an RPC server on `address` exposing the oracle backend.
pub async fn bind_backend_server(
    registry: RegistryHandle,
    address: &str,
) -> Result<RpcServer, RpcError> {
    let mut server = RpcServer::bind(address).await?;
    server.add_service(Arc::new(OracleServiceServer::new(Arc::new(
        OracleBackend::new(registry),
    ))));
    Ok(server)
}

/// Serve the oracle backend on `address` until shutdown.
pub async fn run_backend_server(
    registry: RegistryHandle,
    address: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<(), RpcError> {
    let server = bind_backend_server(registry, address).await?;
    let local_addr: SocketAddr = server.local_addr();
    debug!(%local_addr, "Oracle backend serving");
    server.serve(shutdown).await
}
