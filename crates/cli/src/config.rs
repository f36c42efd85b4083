//! Command-line configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use corelib::{AddressResolver, NetworkConfig, SystemResolver};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

/// Inspect, encode and resolve transport endpoints.
#[derive(Debug, Parser)]
#[command(name = "endpointctl", version, long_about = None)]
pub struct CliConfig {
    /// Network configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Loads `--config`, or the defaults when none is given.
    pub fn network_config(&self) -> anyhow::Result<NetworkConfig> {
        match &self.config {
            Some(path) => NetworkConfig::from_path(path)
                .with_context(|| format!("loading network config from {}", path.display())),
            None => Ok(NetworkConfig::default()),
        }
    }

    fn init_logging(&self) {
        let level = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        // A second init (e.g. from tests) keeps the first subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.init_logging();
        let network = self.network_config()?;
        debug!(?network, "loaded network config");

        let registry = transports::default_registry(network);
        let resolver: Arc<dyn AddressResolver> = Arc::new(SystemResolver);
        let result = self.command.execute(&registry, resolver).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print!("{}", result);
        }
        Ok(())
    }
}
