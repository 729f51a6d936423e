//! One-shot control-plane queries.

use anyhow::Context;
use auxo_rpc::{FleetClient, OracleClient, RpcClient};
use auxo_types::config::HestiaConfig;

pub async fn cmd_fleet_agents(config: &HestiaConfig, json: bool) -> anyhow::Result<()> {
    let address = config.frontend_client.authority();
    let client = FleetClient::new(RpcClient::new(address.clone(), config.request_timeout()));
    let number = client
        .get_number_of_agents(config.request_timeout())
        .await
        .with_context(|| format!("GetNumberOfAgents on {address} failed"))?;
    if json {
        println!("{}", serde_json::json!({ "number": number }));
    } else {
        println!("{number}");
    }
    Ok(())
}

pub async fn cmd_service_exists(
    config: &HestiaConfig,
    name: &str,
    json: bool,
) -> anyhow::Result<()> {
    let address = config.backend_client.authority();
    let client = OracleClient::new(RpcClient::new(address.clone(), config.request_timeout()));
    let exists = client
        .check_service_exists(name, config.request_timeout())
        .await
        .with_context(|| format!("CheckServiceExists on {address} failed"))?;
    if json {
        println!("{}", serde_json::json!({ "service": name, "exists": exists }));
    } else {
        println!("{name}: {}", if exists { "exists" } else { "not found" });
    }
    Ok(())
}
