//! Subcommands and their results.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Subcommand, ValueEnum};
use corelib::network::is_wildcard;
use corelib::{
    spawn_connectors, AddressResolver, Connector, EndpointInfo, EndpointRef, EndpointRegistry,
    EndpointSelection, Error, InputStream, NetworkProxy, OutputStream, ProxyKind,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Selection {
    Random,
    Ordered,
}

impl From<Selection> for EndpointSelection {
    fn from(s: Selection) -> Self {
        match s {
            Selection::Random => EndpointSelection::Random,
            Selection::Ordered => EndpointSelection::Ordered,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse endpoint strings and print their canonical form
    Parse {
        #[arg(required = true)]
        endpoints: Vec<String>,
        /// Parse as object adapter endpoints
        #[arg(long)]
        adapter: bool,
    },

    /// Encode endpoints as a hex wire-format endpoint list
    Encode {
        #[arg(required = true)]
        endpoints: Vec<String>,
    },

    /// Decode a hex wire-format endpoint list
    Decode { hex: String },

    /// Resolve an endpoint into connectors in attempt order
    Resolve {
        endpoint: String,
        #[arg(long, value_enum, default_value_t = Selection::Random)]
        selection: Selection,
        /// Give up after this many milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        /// Tunnel through a SOCKS proxy
        #[arg(long, conflicts_with = "http_proxy")]
        socks_proxy: Option<SocketAddr>,
        /// Tunnel through an HTTP proxy
        #[arg(long)]
        http_proxy: Option<SocketAddr>,
    },

    /// Show what an object adapter endpoint binds and publishes
    Expand { endpoint: String },
}

/// One endpoint as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub endpoint: String,
    pub hash: i32,
    #[serde(flatten)]
    pub info: EndpointInfo,
}

impl EndpointSummary {
    fn of(endpoint: &EndpointRef) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            hash: endpoint.hash_value(),
            info: endpoint.info(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectorSummary {
    pub protocol: String,
    pub address: SocketAddr,
    pub target: SocketAddr,
    pub connection_id: String,
    pub params: String,
    pub display: String,
}

impl From<&Connector> for ConnectorSummary {
    fn from(c: &Connector) -> Self {
        Self {
            protocol: c.protocol().to_string(),
            address: c.address(),
            target: c.target(),
            connection_id: c.connection_id().to_string(),
            params: c.params().to_string(),
            display: c.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandResult {
    Endpoints {
        endpoints: Vec<EndpointSummary>,
    },
    Encoded {
        hex: String,
        count: usize,
    },
    Connectors {
        connectors: Vec<ConnectorSummary>,
    },
    Expansion {
        bind: Vec<EndpointSummary>,
        publish: Vec<EndpointSummary>,
    },
}

fn summarize(endpoints: &[EndpointRef]) -> Vec<EndpointSummary> {
    endpoints.iter().map(EndpointSummary::of).collect()
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Endpoints { endpoints } => {
                for e in endpoints {
                    writeln!(f, "{}  (hash {})", e.endpoint, e.hash)?;
                }
            }
            CommandResult::Encoded { hex, .. } => writeln!(f, "{}", hex)?,
            CommandResult::Connectors { connectors } => {
                for c in connectors {
                    writeln!(f, "{}", c.display)?;
                }
            }
            CommandResult::Expansion { bind, publish } => {
                writeln!(f, "bind:")?;
                for e in bind {
                    writeln!(f, "  {}", e.endpoint)?;
                }
                writeln!(f, "publish:")?;
                for e in publish {
                    writeln!(f, "  {}", e.endpoint)?;
                }
            }
        }
        Ok(())
    }
}

impl Command {
    pub async fn execute(
        &self,
        registry: &EndpointRegistry,
        resolver: Arc<dyn AddressResolver>,
    ) -> anyhow::Result<CommandResult> {
        match self {
            Command::Parse { endpoints, adapter } => {
                let parsed = parse_all(registry, endpoints, *adapter)?;
                Ok(CommandResult::Endpoints {
                    endpoints: summarize(&parsed),
                })
            }
            Command::Encode { endpoints } => {
                let parsed = parse_all(registry, endpoints, false)?;
                let mut out = OutputStream::new();
                registry.write_endpoints(&parsed, &mut out);
                Ok(CommandResult::Encoded {
                    hex: hex::encode(out.as_slice()),
                    count: parsed.len(),
                })
            }
            Command::Decode { hex } => {
                let bytes = hex::decode(hex.trim()).context("input is not valid hex")?;
                let mut input = InputStream::new(&bytes);
                let endpoints = registry.read_endpoints(&mut input)?;
                if !input.is_empty() {
                    bail!("{} trailing bytes after endpoint list", input.remaining());
                }
                Ok(CommandResult::Endpoints {
                    endpoints: summarize(&endpoints),
                })
            }
            Command::Resolve {
                endpoint,
                selection,
                timeout_ms,
                socks_proxy,
                http_proxy,
            } => {
                let endpoint = registry.create_from_string(endpoint, false)?;
                let proxy = match (socks_proxy, http_proxy) {
                    (Some(address), _) => Some(NetworkProxy {
                        kind: ProxyKind::Socks,
                        address: *address,
                    }),
                    (None, Some(address)) => Some(NetworkProxy {
                        kind: ProxyKind::Http,
                        address: *address,
                    }),
                    (None, None) => None,
                };
                let mut handle = spawn_connectors(endpoint, resolver, (*selection).into(), proxy);
                let connectors = tokio::select! {
                    result = &mut handle => result?,
                    _ = tokio::time::sleep(Duration::from_millis(*timeout_ms)) => {
                        handle.cancel();
                        info!(host = handle.host(), timeout_ms, "resolution timed out");
                        return Err(Error::Cancelled).context(format!("resolution took longer than {}ms", timeout_ms));
                    }
                };
                Ok(CommandResult::Connectors {
                    connectors: connectors.iter().map(ConnectorSummary::from).collect(),
                })
            }
            Command::Expand { endpoint } => {
                let endpoint = registry.create_from_string(endpoint, true)?;
                let (bind, publish) = endpoint.expand_host(resolver.as_ref()).await?;
                let publish = match publish {
                    Some(publish) => vec![publish],
                    None if is_wildcard(endpoint.host()) => endpoint.expand_if_wildcard(resolver.as_ref()),
                    None => bind.clone(),
                };
                debug!(bind = bind.len(), publish = publish.len(), "expanded adapter endpoint");
                Ok(CommandResult::Expansion {
                    bind: summarize(&bind),
                    publish: summarize(&publish),
                })
            }
        }
    }
}

fn parse_all(registry: &EndpointRegistry, endpoints: &[String], adapter: bool) -> anyhow::Result<Vec<EndpointRef>> {
    endpoints
        .iter()
        .map(|endpoint| {
            registry
                .create_from_string(endpoint, adapter)
                .with_context(|| format!("parsing `{}'", endpoint))
        })
        .collect()
}
