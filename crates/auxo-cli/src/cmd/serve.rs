//! Long-running processes: broker, agent, oracle, hestia.

use super::ctrl_c_shutdown;
use anyhow::Context;
use auxo_api::ControlPlane;
use auxo_fleet::{Actor, Broker};
use auxo_registry::{run_backend_server, ParsePolicy, RegistryHandle, ServiceRegistry};
use auxo_types::config::{AgentConfig, BrokerConfig, HestiaConfig, OracleConfig};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn cmd_broker(config: BrokerConfig) -> anyhow::Result<()> {
    let shutdown = ctrl_c_shutdown();
    let runtime = Broker::new(config)
        .start(shutdown.subscribe())
        .await
        .context("Failed to start broker")?;
    info!(
        fleet = %runtime.fleet_endpoint(),
        rpc = %runtime.rpc_addr(),
        "Olympus started"
    );
    runtime.wait().await.context("Broker stopped with an error")?;
    info!("Olympus stopped");
    Ok(())
}

pub async fn cmd_agent(mut config: AgentConfig, name: Option<String>) -> anyhow::Result<()> {
    if let Some(name) = name {
        config.name = name;
    }
    let shutdown = ctrl_c_shutdown();
    let mut actor = Actor::new(config);
    actor.bind().await.context("Failed to set up agent endpoints")?;
    if let Some(workers) = actor.worker_endpoint() {
        info!(agent = ?actor.origin().name, %workers, "Apollo started");
    }

    let result = actor.run(shutdown.subscribe()).await;
    actor.close().await;
    result.context("Agent loop stopped with an error")?;
    info!("Apollo stopped");
    Ok(())
}

pub async fn cmd_oracle(config: OracleConfig) -> anyhow::Result<()> {
    let policy = ParsePolicy::from_skip_invalid(config.skip_invalid_manifests);
    let (registry, skipped) = ServiceRegistry::load(&config.services_root, policy)
        .with_context(|| {
            format!(
                "Failed to build registry from {}",
                config.services_root.display()
            )
        })?;
    for error in &skipped {
        warn!(error = %error, "Skipped manifest");
    }
    info!(services = registry.len(), root = %config.services_root.display(), "Registry built");

    if let Some(output) = &config.registry_output {
        if let Err(e) = registry.export_xml(output) {
            warn!(error = %e, "Registry export failed");
        }
    }

    let shutdown = ctrl_c_shutdown();
    let address = config.listen_address().authority();
    info!(name = %config.name, %address, "Oracle started");
    run_backend_server(
        RegistryHandle::new(config.services_root.clone(), registry),
        &address,
        shutdown.subscribe(),
    )
    .await
    .context("Oracle server failed")?;
    info!(name = %config.name, "Oracle stopped");
    Ok(())
}

pub async fn cmd_hestia(config: HestiaConfig) -> anyhow::Result<()> {
    let shutdown = ctrl_c_shutdown();
    let control = Arc::new(ControlPlane::from_config(&config));
    let listener = auxo_api::bind(&config.listen_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_address().authority()))?;
    auxo_api::serve(listener, control, shutdown.subscribe())
        .await
        .context("HTTP server failed")?;
    Ok(())
}
