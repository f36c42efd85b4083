//! Connectors: one resolved, attemptable destination each.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Kind of intermediate proxy a connection goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    Socks,
    Http,
}

/// A SOCKS or HTTP proxy that outgoing connections are tunnelled through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkProxy {
    pub kind: ProxyKind,
    pub address: SocketAddr,
}

/// A concrete destination handed to a transport's connection opener.
///
/// Identity (equality and hashing) covers the transport type, the resolved
/// address, the connection id and the transport's connector parameters. The
/// source address and proxy are carried along for the opener but do not
/// distinguish cached connections.
#[derive(Debug, Clone)]
pub struct Connector {
    type_code: i16,
    protocol: String,
    address: SocketAddr,
    source_address: Option<IpAddr>,
    connection_id: String,
    proxy: Option<NetworkProxy>,
    params: String,
}

impl Connector {
    pub fn new(
        type_code: i16,
        protocol: impl Into<String>,
        address: SocketAddr,
        source_address: Option<IpAddr>,
        connection_id: impl Into<String>,
        proxy: Option<NetworkProxy>,
        params: impl Into<String>,
    ) -> Self {
        Self {
            type_code,
            protocol: protocol.into(),
            address,
            source_address,
            connection_id: connection_id.into(),
            proxy,
            params: params.into(),
        }
    }

    pub fn type_code(&self) -> i16 {
        self.type_code
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn source_address(&self) -> Option<IpAddr> {
        self.source_address
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn proxy(&self) -> Option<&NetworkProxy> {
        self.proxy.as_ref()
    }

    /// Transport-specific parameters in their canonical option form.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// Address the opener should dial: the proxy when one is set.
    pub fn target(&self) -> SocketAddr {
        self.proxy.as_ref().map(|p| p.address).unwrap_or(self.address)
    }
}

impl PartialEq for Connector {
    fn eq(&self, other: &Self) -> bool {
        self.type_code == other.type_code
            && self.address == other.address
            && self.connection_id == other.connection_id
            && self.params == other.params
    }
}

impl Eq for Connector {}

impl Hash for Connector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_code.hash(state);
        self.address.hash(state);
        self.connection_id.hash(state);
        self.params.hash(state);
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.protocol, self.address)?;
        if let Some(source) = &self.source_address {
            write!(f, " from {}", source)?;
        }
        if let Some(proxy) = &self.proxy {
            write!(f, " via {:?} proxy {}", proxy.kind, proxy.address)?;
        }
        if !self.connection_id.is_empty() {
            write!(f, " [{}]", self.connection_id)?;
        }
        if !self.params.is_empty() {
            write!(f, " {}", self.params)?;
        }
        Ok(())
    }
}
