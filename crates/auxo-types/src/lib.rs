//! Core types for the Auxo fleet substrate.
//!
//! This crate defines the data shared by the broker, the agent actors, the
//! control-plane RPC layer and the service registry. It contains no
//! networking and no business logic.

pub mod config;
pub mod discovery;
pub mod entity;
pub mod error;

pub use discovery::{Command, DiscoveryMessage, Header};
pub use entity::{Entity, EntityType};
pub use error::{AuxoError, AuxoResult};
