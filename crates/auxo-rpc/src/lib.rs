//! Auxo control-plane RPC.
//!
//! A deliberately small request/response layer: JSON bodies in length-prefixed
//! frames over TCP, methods named `Service.Method`, a caller deadline carried
//! on every request and enforced on both ends.

pub mod client;
pub mod error;
pub mod message;
pub mod server;
pub mod service;

pub use client::RpcClient;
pub use error::RpcError;
pub use message::{
    CheckServiceExistsRequest, CheckServiceExistsResponse, GetNumberOfAgentsRequest,
    GetNumberOfAgentsResponse, RpcRequest, RpcResponse, RpcStatus,
};
pub use server::{CallContext, RpcServer, RpcService};
pub use service::{
    FleetClient, FleetService, FleetServiceServer, OracleClient, OracleService,
    OracleServiceServer,
};
