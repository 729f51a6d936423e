//! Service registry for the Auxo control plane.
//!
//! Services are declared by `ServiceManifest.xml` files anywhere under a
//! services root. [`ServiceRegistry`] is an immutable snapshot of one scan;
//! [`RegistryHandle`] shares the current snapshot and swaps it on refresh;
//! [`OracleBackend`] answers existence checks over RPC.

pub mod error;
pub mod manifest;
pub mod oracle;
pub mod registry;

pub use error::RegistryError;
pub use manifest::{Manifest, MANIFEST_FILE_NAME};
pub use oracle::{bind_backend_server, run_backend_server, OracleBackend};
pub use registry::{DuplicateService, ParsePolicy, RegistryHandle, ServiceRegistry};
