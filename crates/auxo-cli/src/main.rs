//! Auxo CLI: runs the broker, agents, the oracle and the HTTP façade, and
//! issues one-shot control-plane queries.

mod cli;
mod cmd;
mod config;

use crate::cli::*;
use clap::Parser;

fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, source) = config::load_config(cli.config.as_deref());
    init_tracing(&config.log_level);
    source.log();

    match cli.command {
        Commands::Broker => cmd::serve::cmd_broker(config.broker).await,
        Commands::Agent { name } => cmd::serve::cmd_agent(config.agent, name).await,
        Commands::Oracle => cmd::serve::cmd_oracle(config.oracle).await,
        Commands::Hestia => cmd::serve::cmd_hestia(config.hestia).await,
        Commands::Registry(RegistryCommands::Refresh { root, output }) => {
            cmd::registry::cmd_registry_refresh(&config.oracle, root, output)
        }
        Commands::Fleet(FleetCommands::Agents { json }) => {
            cmd::query::cmd_fleet_agents(&config.hestia, json).await
        }
        Commands::Service(ServiceCommands::Exists { name, json }) => {
            cmd::query::cmd_service_exists(&config.hestia, &name, json).await
        }
    }
}
