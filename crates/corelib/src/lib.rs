//! Core library for transport endpoints.
//!
//! This crate provides the fundamental abstractions for describing and
//! reaching RPC transport endpoints:
//! - Reproducible hash accumulation
//! - Endpoint option grammar and wire encoding
//! - Protocol identity and network defaults
//! - Address resolution with ordered and randomized selection
//! - Endpoints, connectors and the endpoint registry

pub mod connector;
pub mod endpoint;
pub mod error;
pub mod hash;
pub mod network;
pub mod options;
pub mod protocol;
pub mod registry;
pub mod wire;

pub use connector::{Connector, NetworkProxy, ProxyKind};
pub use endpoint::{
    share_with_connection_id, spawn_connectors, Endpoint, EndpointInfo, EndpointRef, Expansion, IpEndpoint,
    IpEndpointBuilder, NoParams, TransportParams,
};
pub use error::{Error, Result};
pub use hash::HashCombiner;
pub use network::{AddressResolver, EndpointSelection, ResolveHandle, ResolveRequest, StaticResolver, SystemResolver};
pub use protocol::{NetworkConfig, ProtocolInstance, ProtocolSupport};
pub use registry::{EndpointFactory, EndpointRegistry, IpEndpointFactory};
pub use wire::{InputStream, OutputStream};
