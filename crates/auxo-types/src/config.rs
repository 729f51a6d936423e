//! Configuration structs for every Auxo process.
//!
//! All fields are defaulted so a partial (or missing) config file still
//! yields a runnable setup. Loading from disk lives in the CLI; components
//! only receive these plain structs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default heartbeat interval shared by actors and the broker.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Default liveness multiplier: an entity is dropped after this many silent
/// heartbeat intervals.
pub const DEFAULT_LIVENESS_MULTIPLIER: u32 = 3;

/// Default caller deadline for control-plane RPCs.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuxoConfig {
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Central broker (olympus).
    pub broker: BrokerConfig,
    /// Agent process (apollo).
    pub agent: AgentConfig,
    /// Registry-backed backend service (oracle).
    pub oracle: OracleConfig,
    /// Control-plane façade (hestia).
    pub hestia: HestiaConfig,
}

impl Default for AuxoConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            broker: BrokerConfig::default(),
            agent: AgentConfig::default(),
            oracle: OracleConfig::default(),
            hestia: HestiaConfig::default(),
        }
    }
}

/// A `hostname:port` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAddress {
    pub hostname: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// `hostname:port`, suitable for `TcpListener::bind` / `TcpStream::connect`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Fleet-facing host. `localhost`, `*` and `0.0.0.0` bind all interfaces;
    /// an empty host leaves the broker unconfigured.
    pub hostname: String,
    /// Fleet-facing port.
    pub port: u16,
    /// Where the control-plane RPC server listens.
    pub frontend_server: ServerAddress,
    /// Expected interval between agent heartbeats.
    pub heartbeat_interval_ms: u64,
    /// Silent intervals tolerated before an entity is evicted.
    pub liveness_multiplier: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 5559,
            frontend_server: ServerAddress::new("127.0.0.1", 6000),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            liveness_multiplier: DEFAULT_LIVENESS_MULTIPLIER,
        }
    }
}

impl BrokerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    /// `liveness_multiplier` × heartbeat interval (multiplier floored at 1).
    pub fn liveness_timeout(&self) -> Duration {
        self.heartbeat_interval() * self.liveness_multiplier.max(1)
    }
}

/// Agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name announced in READY.
    pub name: String,
    /// Broker host.
    pub olympus: String,
    /// Broker fleet port.
    pub port: u16,
    /// Endpoint bound for local workers.
    pub workers_endpoint: String,
    /// Heartbeat interval; also bounds the actor's wait.
    pub heartbeat_interval_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "apollo".to_string(),
            olympus: "localhost".to_string(),
            port: 5559,
            workers_endpoint: "tcp://127.0.0.1:0".to_string(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

impl AgentConfig {
    /// `tcp://<olympus>:<port>`.
    pub fn broker_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.olympus, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

/// Oracle (service registry backend) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Name used in log lines.
    pub name: String,
    pub hostname: String,
    pub port: u16,
    /// Root of the service tree scanned for `ServiceManifest.xml`.
    pub services_root: PathBuf,
    /// Where to write the diagnostic registry export, if anywhere.
    pub registry_output: Option<PathBuf>,
    /// Skip unparsable manifests instead of refusing to start.
    pub skip_invalid_manifests: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            name: "oracle".to_string(),
            hostname: "127.0.0.1".to_string(),
            port: 6001,
            services_root: PathBuf::from("oracle/services"),
            registry_output: Some(PathBuf::from("oracle/registry/registry.xml")),
            skip_invalid_manifests: false,
        }
    }
}

impl OracleConfig {
    pub fn listen_address(&self) -> ServerAddress {
        ServerAddress::new(self.hostname.clone(), self.port)
    }
}

/// Control-plane façade settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HestiaConfig {
    /// HTTP listen host.
    pub hostname: String,
    /// HTTP listen port.
    pub port: u16,
    /// Broker RPC server.
    pub frontend_client: ServerAddress,
    /// Oracle RPC server.
    pub backend_client: ServerAddress,
    /// Deadline applied to each forwarded call.
    pub request_timeout_secs: u64,
}

impl Default for HestiaConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 8080,
            frontend_client: ServerAddress::new("127.0.0.1", 6000),
            backend_client: ServerAddress::new("127.0.0.1", 6001),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl HestiaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listen_address(&self) -> ServerAddress {
        ServerAddress::new(self.hostname.clone(), self.port)
    }
}
