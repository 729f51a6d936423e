//! Control-plane façade (hestia).
//!
//! Forwards HTTP queries to the broker's `HestiaFrontendService` and the
//! oracle's `OracleBackendService` and renders the answers as JSON.

pub mod control_plane;
pub mod error;
pub mod routes;
pub mod server;

pub use control_plane::ControlPlane;
pub use error::ApiError;
pub use routes::build_router;
pub use server::{bind, serve};
