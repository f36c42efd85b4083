//! Protocol identity and the network defaults endpoints draw from.

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Address families a protocol may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolSupport {
    Ipv4,
    Ipv6,
    #[default]
    Both,
}

impl ProtocolSupport {
    /// True when addresses of `addr`'s family may be used.
    pub fn accepts(&self, addr: &IpAddr) -> bool {
        match self {
            ProtocolSupport::Ipv4 => addr.is_ipv4(),
            ProtocolSupport::Ipv6 => addr.is_ipv6(),
            ProtocolSupport::Both => true,
        }
    }
}

fn default_timeout() -> i32 {
    60_000
}

fn default_protocol() -> String {
    "tcp".to_string()
}

/// Process-wide network defaults.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Host substituted when an endpoint omits `-h`.
    pub default_host: Option<String>,
    /// Source address applied to outgoing endpoints that do not set one.
    pub default_source_address: Option<IpAddr>,
    pub protocol_support: ProtocolSupport,
    /// Sort IPv6 addresses ahead of IPv4 ones after resolution.
    pub prefer_ipv6: bool,
    /// Connect timeout in milliseconds for stream transports, `-1` for none.
    #[serde(default = "default_timeout")]
    pub default_timeout: i32,
    /// Protocol used for endpoint strings starting with `default`.
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_host: None,
            default_source_address: None,
            protocol_support: ProtocolSupport::Both,
            prefer_ipv6: false,
            default_timeout: default_timeout(),
            default_protocol: default_protocol(),
        }
    }
}

impl NetworkConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: NetworkConfig = serde_json::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout == 0 || self.default_timeout < -1 {
            return Err(Error::Config(format!(
                "default_timeout must be positive or -1, got {}",
                self.default_timeout
            )));
        }
        if let Some(addr) = &self.default_source_address {
            if !self.protocol_support.accepts(addr) {
                return Err(Error::Config(format!(
                    "default_source_address {} does not match protocol support {:?}",
                    addr, self.protocol_support
                )));
            }
        }
        Ok(())
    }
}

/// Identity of one transport protocol plus the shared network defaults.
///
/// Endpoints hold an `Arc<ProtocolInstance>`; `secure` and `datagram` live
/// here rather than on each endpoint because they are properties of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInstance {
    type_code: i16,
    protocol: String,
    secure: bool,
    datagram: bool,
    config: Arc<NetworkConfig>,
}

impl ProtocolInstance {
    pub fn new(
        type_code: i16,
        protocol: impl Into<String>,
        secure: bool,
        datagram: bool,
        config: Arc<NetworkConfig>,
    ) -> Self {
        Self {
            type_code,
            protocol: protocol.into(),
            secure,
            datagram,
            config,
        }
    }

    pub fn type_code(&self) -> i16 {
        self.type_code
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn datagram(&self) -> bool {
        self.datagram
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn default_host(&self) -> Option<&str> {
        self.config.default_host.as_deref()
    }

    pub fn default_source_address(&self) -> Option<IpAddr> {
        self.config.default_source_address
    }

    pub fn protocol_support(&self) -> ProtocolSupport {
        self.config.protocol_support
    }

    pub fn prefer_ipv6(&self) -> bool {
        self.config.prefer_ipv6
    }

    pub fn default_timeout(&self) -> i32 {
        self.config.default_timeout
    }
}
