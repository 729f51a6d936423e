//! Clap CLI definitions for Auxo.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  auxo broker                   Run the broker (olympus)
  auxo agent --name apollo-2    Run an agent and announce it to the broker
  auxo oracle                   Build the service registry and serve it
  auxo hestia                   Run the HTTP control-plane façade
  auxo registry refresh         Rebuild and export the service registry
  auxo fleet agents             Ask the broker how many agents are live
  auxo service exists pendulum  Ask the oracle whether a service exists";

/// Auxo: fleet discovery for agents, brokers and services.
#[derive(Parser)]
#[command(name = "auxo", version, after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to config file (defaults to ~/.auxo/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the broker until Ctrl+C.
    Broker,
    /// Run an agent actor until Ctrl+C.
    Agent {
        /// Override the agent name from the config file.
        #[arg(long)]
        name: Option<String>,
    },
    /// Build the service registry, export it, and serve existence checks.
    Oracle,
    /// Run the control-plane HTTP façade.
    Hestia,
    /// Manage the service registry [*].
    #[command(subcommand)]
    Registry(RegistryCommands),
    /// Query the fleet through the broker [*].
    #[command(subcommand)]
    Fleet(FleetCommands),
    /// Query the service registry through the oracle [*].
    #[command(subcommand)]
    Service(ServiceCommands),
}

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// Rebuild from the manifests and export; any invalid manifest is fatal.
    Refresh {
        /// Services root (defaults to `oracle.services_root`).
        #[arg(long)]
        root: Option<PathBuf>,
        /// Export path (defaults to `oracle.registry_output`).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum FleetCommands {
    /// Print the number of live agents.
    Agents {
        /// Output as JSON for scripting.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// Check whether a service is registered.
    Exists {
        /// Service name as declared in its manifest.
        name: String,
        /// Output as JSON for scripting.
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested() {
        let cli = Cli::try_parse_from([
            "auxo",
            "registry",
            "refresh",
            "--root",
            "svc",
            "--config",
            "auxo.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("auxo.toml")));
        match cli.command {
            Commands::Registry(RegistryCommands::Refresh { root, output }) => {
                assert_eq!(root, Some(PathBuf::from("svc")));
                assert!(output.is_none());
            }
            _ => panic!("expected registry refresh"),
        }

        let cli = Cli::try_parse_from(["auxo", "service", "exists", "pendulum"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Service(ServiceCommands::Exists { ref name, json: false }) if name == "pendulum"
        ));
    }
}
