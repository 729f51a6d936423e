//! Typed control-plane services and their clients.
//!
//! [`FleetService`] is implemented by the broker and [`OracleService`] by the
//! registry backend. The `*Server` adapters plug an implementation into an
//! [`RpcServer`](crate::RpcServer); the `*Client` types call them remotely.

use crate::client::RpcClient;
use crate::error::RpcError;
use crate::message::{
    CheckServiceExistsRequest, CheckServiceExistsResponse, GetNumberOfAgentsRequest,
    GetNumberOfAgentsResponse, CHECK_SERVICE_EXISTS, GET_NUMBER_OF_AGENTS,
};
use crate::server::{CallContext, RpcService};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Fleet-state queries.
#[async_trait]
pub trait FleetService: Send + Sync + 'static {
    async fn get_number_of_agents(
        &self,
        ctx: &CallContext,
        request: GetNumberOfAgentsRequest,
    ) -> Result<GetNumberOfAgentsResponse, RpcError>;
}

/// Service registry queries.
#[async_trait]
pub trait OracleService: Send + Sync + 'static {
    async fn check_service_exists(
        &self,
        ctx: &CallContext,
        request: CheckServiceExistsRequest,
    ) -> Result<CheckServiceExistsResponse, RpcError>;
}

fn params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    // `{}`-shaped requests may arrive as null.
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn method_name(full: &str) -> &str {
    full.split_once('.').map_or(full, |(_, method)| method)
}

fn service_name(full: &'static str) -> &'static str {
    full.split_once('.').map_or(full, |(service, _)| service)
}

/// Exposes a [`FleetService`] as `HestiaFrontendService`.
pub struct FleetServiceServer<T> {
    inner: Arc<T>,
}

impl<T: FleetService> FleetServiceServer<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: FleetService> RpcService for FleetServiceServer<T> {
    fn name(&self) -> &'static str {
        service_name(GET_NUMBER_OF_AGENTS)
    }

    async fn call(&self, ctx: &CallContext, method: &str, p: Value) -> Result<Value, RpcError> {
        if method == method_name(GET_NUMBER_OF_AGENTS) {
            let response = self.inner.get_number_of_agents(ctx, params(p)?).await?;
            Ok(serde_json::to_value(response)?)
        } else {
            Err(RpcError::MethodNotFound(format!("{}.{method}", self.name())))
        }
    }
}

/// Exposes an [`OracleService`] as `OracleBackendService`.
pub struct OracleServiceServer<T> {
    inner: Arc<T>,
}

impl<T: OracleService> OracleServiceServer<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: OracleService> RpcService for OracleServiceServer<T> {
    fn name(&self) -> &'static str {
        service_name(CHECK_SERVICE_EXISTS)
    }

    async fn call(&self, ctx: &CallContext, method: &str, p: Value) -> Result<Value, RpcError> {
        if method == method_name(CHECK_SERVICE_EXISTS) {
            let response = self.inner.check_service_exists(ctx, params(p)?).await?;
            Ok(serde_json::to_value(response)?)
        } else {
            Err(RpcError::MethodNotFound(format!("{}.{method}", self.name())))
        }
    }
}

/// Remote [`FleetService`].
pub struct FleetClient {
    rpc: RpcClient,
}

impl FleetClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub fn address(&self) -> &str {
        self.rpc.address()
    }

    pub async fn get_number_of_agents(&self, deadline: Duration) -> Result<i32, RpcError> {
        let response: GetNumberOfAgentsResponse = self
            .rpc
            .invoke(GET_NUMBER_OF_AGENTS, &GetNumberOfAgentsRequest {}, deadline)
            .await?;
        Ok(response.number)
    }
}

/// Remote [`OracleService`].
pub struct OracleClient {
    rpc: RpcClient,
}

impl OracleClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub fn address(&self) -> &str {
        self.rpc.address()
    }

    pub async fn check_service_exists(
        &self,
        service_name: &str,
        deadline: Duration,
    ) -> Result<bool, RpcError> {
        let request = CheckServiceExistsRequest {
            service_name: service_name.to_string(),
        };
        let response: CheckServiceExistsResponse = self
            .rpc
            .invoke(CHECK_SERVICE_EXISTS, &request, deadline)
            .await?;
        Ok(response.exists)
    }
}
