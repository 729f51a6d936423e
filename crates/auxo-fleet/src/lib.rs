//! Auxo fleet runtime.
//!
//! - [`Actor`]: the agent side; announces itself, heartbeats, relays workers
//! - [`Broker`]: accepts actors, keeps the [`EntityDirectory`], serves
//!   fleet-state queries over RPC

pub mod actor;
pub mod broker;
pub mod directory;

pub use actor::{Actor, HandshakeState, LoggingWorkerHandler, WorkerHandler};
pub use broker::{
    run_frontend_server, Broker, BrokerFleetService, BrokerHandle, BrokerRuntime,
    DirectoryRequest,
};
pub use directory::{EntityDirectory, EntityRecord};
