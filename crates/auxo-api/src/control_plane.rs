//! RPC clients the façade forwards to.

use auxo_rpc::{FleetClient, OracleClient, RpcClient, RpcError};
use auxo_types::config::HestiaConfig;
use std::time::Duration;

/// The broker and oracle clients, built once at startup.
pub struct ControlPlane {
    fleet: FleetClient,
    oracle: OracleClient,
    deadline: Duration,
}

impl ControlPlane {
    pub fn new(fleet: FleetClient, oracle: OracleClient, deadline: Duration) -> Self {
        Self {
            fleet,
            oracle,
            deadline,
        }
    }

    /// Clients for the addresses in `config`. Connections open on first use.
    pub fn from_config(config: &HestiaConfig) -> Self {
        let deadline = config.request_timeout();
        Self::new(
            FleetClient::new(RpcClient::new(
                config.frontend_client.authority(),
                deadline,
            )),
            OracleClient::new(RpcClient::new(config.backend_client.authority(), deadline)),
            deadline,
        )
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn fleet(&self) -> &FleetClient {
        &self.fleet
    }

    pub fn oracle(&self) -> &OracleClient {
        &self.oracle
    }

    pub async fn number_of_agents(&self) -> Result<i32, RpcError> {
        self.fleet.get_number_of_agents(self.deadline).await
    }

    pub async fn service_exists(&self, service_name: &str) -> Result<bool, RpcError> {
        self.oracle
            .check_service_exists(service_name, self.deadline)
            .await
    }
}
