//! Concrete IP transports.
//!
//! This crate provides the transports an application normally registers:
//! - `tcp` and `ssl`, stream transports with a connect timeout
//! - `udp`, a datagram transport with multicast settings
//!
//! Each transport is an [`IpEndpoint`](corelib::IpEndpoint) parametrized by
//! its options type, registered under a fixed type code.

pub mod tcp;
pub mod udp;

use std::sync::Arc;

use corelib::{EndpointRegistry, IpEndpointFactory, NetworkConfig, ProtocolInstance};
use tracing::info;

pub use tcp::{TcpEndpoint, TcpParams};
pub use udp::{UdpEndpoint, UdpParams};

pub const TCP_TYPE: i16 = 1;
pub const SSL_TYPE: i16 = 2;
pub const UDP_TYPE: i16 = 3;

pub fn tcp_instance(config: Arc<NetworkConfig>) -> Arc<ProtocolInstance> {
    Arc::new(ProtocolInstance::new(TCP_TYPE, "tcp", false, false, config))
}

pub fn ssl_instance(config: Arc<NetworkConfig>) -> Arc<ProtocolInstance> {
    Arc::new(ProtocolInstance::new(SSL_TYPE, "ssl", true, false, config))
}

pub fn udp_instance(config: Arc<NetworkConfig>) -> Arc<ProtocolInstance> {
    Arc::new(ProtocolInstance::new(UDP_TYPE, "udp", false, true, config))
}

/// Registers `tcp`, `ssl` and `udp` with `registry`, sharing its config.
pub fn register_defaults(registry: &EndpointRegistry) {
    let config = Arc::clone(registry.config());
    registry.register(
        TCP_TYPE,
        Arc::new(IpEndpointFactory::<TcpParams>::new(tcp_instance(Arc::clone(&config)))),
    );
    registry.register(
        SSL_TYPE,
        Arc::new(IpEndpointFactory::<TcpParams>::new(ssl_instance(Arc::clone(&config)))),
    );
    registry.register(
        UDP_TYPE,
        Arc::new(IpEndpointFactory::<UdpParams>::new(udp_instance(config))),
    );
    info!(types = ?registry.type_codes(), "registered default transports");
}

/// A registry with the default transports already registered.
pub fn default_registry(config: NetworkConfig) -> EndpointRegistry {
    let registry = EndpointRegistry::new(Arc::new(config));
    register_defaults(&registry);
    registry
}
