//! CLI module for stubnet
//!
//! Subcommands:
//! - `stubnet serve` - Run the stub gateway API
//! - `stubnet agent` - Run the virtual node agent
//! - `stubnet check-config` - Validate and print the effective config

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

mod display;

pub use display::*;

use crate::config::{validate_config, Config, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "stubnet")]
#[command(about = "Serverless stub gateway and virtual node agent")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.stubnet/config.yaml)
    #[arg(long, global = true, env = "STUBNET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded into the process environment
    #[arg(long, global = true, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the stub gateway API
    Serve(ServeArgs),

    /// Run the virtual node agent
    Agent(AgentArgs),

    /// Validate the config file and print the effective settings
    CheckConfig,
}

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Bind address for the API
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Port to listen on (default: 1993)
    #[arg(short, long, env = "STUBNET_PORT")]
    pub port: Option<u16>,

    /// Directory holding uploaded code objects
    #[arg(long, value_name = "DIR")]
    pub objects_path: Option<String>,
}

/// Arguments for the agent command
#[derive(Args, Debug, Default)]
pub struct AgentArgs {
    /// Node name reported to the orchestrator (default: hostname)
    #[arg(long, env = "STUBNET_NODE_NAME")]
    pub node_name: Option<String>,

    /// Base URL of the compute backend to probe
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Seconds between node status updates
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Apply command line overrides on top of the file config, then validate the
/// merged result
pub fn apply_overrides(config: &mut Config, command: &Commands) -> Result<(), ConfigError> {
    match command {
        Commands::Serve(args) => {
            if let Some(ref bind_addr) = args.bind_addr {
                config.gateway.bind_addr = bind_addr.clone();
            }
            if let Some(port) = args.port {
                config.gateway.port = port;
            }
            if let Some(ref path) = args.objects_path {
                config.gateway.objects_path = path.clone();
            }
        }
        Commands::Agent(args) => {
            if let Some(ref node_name) = args.node_name {
                config.agent.node_name = Some(node_name.clone());
            }
            if let Some(ref url) = args.backend_url {
                config.agent.backend_url = Some(url.clone());
            }
            if let Some(interval) = args.interval {
                config.agent.status_interval_secs = interval;
            }
        }
        Commands::CheckConfig => {}
    }
    validate_config(config)
}
