//! IP endpoints.
//!
//! An endpoint is an immutable value naming one transport-parametrized
//! destination: host, port, optional source address and connection id, plus
//! whatever extra options its transport defines. [`IpEndpoint`] holds the
//! fields shared by every IP transport and is generic over the transport's
//! [`TransportParams`]. The object-safe [`Endpoint`] trait lets endpoints of
//! different transports live side by side in one list, compared, hashed and
//! sorted as [`EndpointRef`]s.
//!
//! # Identity
//!
//! Two endpoints are equal when they have the same transport type code, host,
//! port, source address, connection id and transport parameters. `secure`
//! and `datagram` follow from the type and are not compared. The hash is a
//! [`HashCombiner`] fold over the same fields, computed once on first use.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::connector::{Connector, NetworkProxy};
use crate::error::{Error, Result};
use crate::hash::HashCombiner;
use crate::network::{is_wildcard, numeric_address, AddressResolver, EndpointSelection, ResolveHandle, ResolveRequest};
use crate::options::{quote_if_needed, require_argument, require_token, walk_options};
use crate::protocol::ProtocolInstance;
use crate::wire::{InputStream, OutputStream};

/// Transport-specific part of an IP endpoint.
///
/// `Ord` orders parameters after the shared fields; it must agree with `Eq`.
pub trait TransportParams: Clone + fmt::Debug + Eq + Ord + Send + Sync + 'static {
    /// Parameters of an endpoint that set no transport option.
    fn from_instance(instance: &ProtocolInstance) -> Self;

    /// Handles one option. Returns `Ok(false)` when the option is not this
    /// transport's.
    fn check_option(&mut self, option: &str, argument: Option<&str>, endpoint: &str) -> Result<bool>;

    /// Appends the option tokens that reproduce these parameters.
    fn append_options(&self, parts: &mut Vec<String>);

    fn hash_into(&self, hash: &mut HashCombiner);

    /// Writes the wire trailer that follows host and port.
    fn write_trailer(&self, out: &mut OutputStream);

    fn read_trailer(instance: &ProtocolInstance, input: &mut InputStream<'_>) -> Result<Self>;

    /// Connector parameters in canonical option form.
    fn connector_params(&self) -> String {
        let mut parts = Vec::new();
        self.append_options(&mut parts);
        parts.join(" ")
    }
}

/// Parameters of a transport with no options of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoParams;

impl TransportParams for NoParams {
    fn from_instance(_instance: &ProtocolInstance) -> Self {
        NoParams
    }

    fn check_option(&mut self, _option: &str, _argument: Option<&str>, _endpoint: &str) -> Result<bool> {
        Ok(false)
    }

    fn append_options(&self, _parts: &mut Vec<String>) {}

    fn hash_into(&self, _hash: &mut HashCombiner) {}

    fn write_trailer(&self, _out: &mut OutputStream) {}

    fn read_trailer(_instance: &ProtocolInstance, _input: &mut InputStream<'_>) -> Result<Self> {
        Ok(NoParams)
    }
}

/// Diagnostic snapshot of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub type_code: i16,
    pub protocol: String,
    pub secure: bool,
    pub datagram: bool,
    pub host: String,
    pub port: u16,
    pub source_address: String,
    pub connection_id: String,
}

/// Endpoints produced by [`Endpoint::expand_host`] plus the one to publish,
/// if any.
pub type Expansion = (Vec<EndpointRef>, Option<EndpointRef>);

/// Shared handle to an endpoint of any transport.
pub type EndpointRef = Arc<dyn Endpoint>;

/// Object-safe view of an endpoint.
#[async_trait]
pub trait Endpoint: fmt::Debug + fmt::Display + Send + Sync + 'static {
    fn type_code(&self) -> i16;
    fn protocol(&self) -> &str;
    fn secure(&self) -> bool;
    fn datagram(&self) -> bool;
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn source_address(&self) -> Option<IpAddr>;
    fn connection_id(&self) -> &str;
    fn info(&self) -> EndpointInfo;

    /// Option string that parses back into an equal endpoint.
    fn options(&self) -> String;

    /// Cached reproducible hash.
    fn hash_value(&self) -> i32;

    /// Total order across transports: type code first, then the fields.
    fn compare(&self, other: &dyn Endpoint) -> Ordering;

    /// True when a connection opened for `other` can also serve this
    /// endpoint: same type code, host, port and source address. Connection
    /// id and transport options are not considered.
    fn equivalent(&self, other: &dyn Endpoint) -> bool {
        self.type_code() == other.type_code()
            && self.host() == other.host()
            && self.port() == other.port()
            && self.source_address() == other.source_address()
    }

    /// Writes host, port and the transport trailer (not the type code).
    fn write_to(&self, out: &mut OutputStream);

    /// Copy of this endpoint with another connection id. Always allocates;
    /// [`share_with_connection_id`] reuses a shared endpoint instead.
    fn with_connection_id(&self, connection_id: &str) -> EndpointRef;

    /// One endpoint per local interface when the host is a wildcard.
    fn expand_if_wildcard(&self, resolver: &dyn AddressResolver) -> Vec<EndpointRef>;

    /// Endpoints to bind and the endpoint to publish for an adapter.
    async fn expand_host(&self, resolver: &dyn AddressResolver) -> Result<Expansion>;

    /// One connector per address, in input order.
    fn connectors(&self, addresses: &[SocketAddr], proxy: Option<&NetworkProxy>) -> Vec<Connector>;

    /// Resolves the host and builds connectors in attempt order.
    async fn connectors_async(
        &self,
        resolver: &dyn AddressResolver,
        selection: EndpointSelection,
        proxy: Option<&NetworkProxy>,
    ) -> Result<Vec<Connector>>;

    fn as_any(&self) -> &dyn Any;
}

impl PartialEq for dyn Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for dyn Endpoint {}

impl PartialOrd for dyn Endpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for dyn Endpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl Hash for dyn Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_value());
    }
}

/// Resolves `endpoint` and builds its connectors on a spawned task.
///
/// The returned handle can be cancelled; a cancelled resolution completes
/// with [`Error::Cancelled`] and its result is discarded.
pub fn spawn_connectors(
    endpoint: EndpointRef,
    resolver: Arc<dyn AddressResolver>,
    selection: EndpointSelection,
    proxy: Option<NetworkProxy>,
) -> ResolveHandle<Vec<Connector>> {
    let host = endpoint.host().to_string();
    ResolveHandle::spawn(host, async move {
        endpoint
            .connectors_async(resolver.as_ref(), selection, proxy.as_ref())
            .await
    })
}

/// `endpoint` tagged with `connection_id`, or the same shared endpoint when
/// the id is unchanged.
pub fn share_with_connection_id(endpoint: &EndpointRef, connection_id: &str) -> EndpointRef {
    if endpoint.connection_id() == connection_id {
        Arc::clone(endpoint)
    } else {
        endpoint.with_connection_id(connection_id)
    }
}

/// An endpoint of an IP-based transport.
#[derive(Debug, Clone)]
pub struct IpEndpoint<P: TransportParams = NoParams> {
    instance: Arc<ProtocolInstance>,
    host: String,
    port: u16,
    source_address: Option<IpAddr>,
    connection_id: String,
    params: P,
    hash: OnceLock<i32>,
}

impl<P: TransportParams> IpEndpoint<P> {
    pub fn new(
        instance: Arc<ProtocolInstance>,
        host: impl Into<String>,
        port: u16,
        source_address: Option<IpAddr>,
        connection_id: impl Into<String>,
        params: P,
    ) -> Self {
        Self {
            instance,
            host: host.into(),
            port,
            source_address,
            connection_id: connection_id.into(),
            params,
            hash: OnceLock::new(),
        }
    }

    /// Starts parsing an endpoint from option tokens.
    pub fn builder(instance: Arc<ProtocolInstance>) -> IpEndpointBuilder<P> {
        IpEndpointBuilder::new(instance)
    }

    /// Decodes host, port and trailer. Source address and connection id are
    /// never on the wire and stay unset.
    pub fn read_from(instance: Arc<ProtocolInstance>, input: &mut InputStream<'_>) -> Result<Self> {
        let host = input.read_string()?;
        let port = input.read_i32()?;
        let port = u16::try_from(port).map_err(|_| Error::decode(format!("port {} out of range", port)))?;
        let params = P::read_trailer(&instance, input)?;
        Ok(Self::new(instance, host, port, None, String::new(), params))
    }

    pub fn instance(&self) -> &Arc<ProtocolInstance> {
        &self.instance
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn source_address(&self) -> Option<IpAddr> {
        self.source_address
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    fn source_string(&self) -> String {
        self.source_address.map(|a| a.to_string()).unwrap_or_default()
    }

    /// Copy with a different connection id; every other field is kept.
    pub fn with_connection_id(&self, connection_id: &str) -> Self {
        if connection_id == self.connection_id {
            return self.clone();
        }
        Self::new(
            Arc::clone(&self.instance),
            self.host.clone(),
            self.port,
            self.source_address,
            connection_id,
            self.params.clone(),
        )
    }

    /// Copy pointing at another host and port.
    pub fn with_host_port(&self, host: impl Into<String>, port: u16) -> Self {
        Self::new(
            Arc::clone(&self.instance),
            host,
            port,
            self.source_address,
            self.connection_id.clone(),
            self.params.clone(),
        )
    }

    pub fn hash_value(&self) -> i32 {
        *self.hash.get_or_init(|| {
            let mut h = HashCombiner::new();
            h.add_i16(self.instance.type_code())
                .add_str(&self.host)
                .add_u16(self.port);
            if let Some(source) = &self.source_address {
                h.add_ip(source);
            }
            h.add_str(&self.connection_id);
            self.params.hash_into(&mut h);
            h.finish()
        })
    }

    pub fn options(&self) -> String {
        let mut parts = Vec::new();
        if !self.host.is_empty() {
            parts.push("-h".to_string());
            parts.push(quote_if_needed(&self.host));
        }
        parts.push("-p".to_string());
        parts.push(self.port.to_string());
        if let Some(source) = &self.source_address {
            parts.push("--sourceAddress".to_string());
            parts.push(quote_if_needed(&source.to_string()));
        }
        self.params.append_options(&mut parts);
        parts.join(" ")
    }

    pub fn write_to(&self, out: &mut OutputStream) {
        out.write_string(&self.host);
        out.write_i32(i32::from(self.port));
        self.params.write_trailer(out);
    }

    pub fn info(&self) -> EndpointInfo {
        EndpointInfo {
            type_code: self.instance.type_code(),
            protocol: self.instance.protocol().to_string(),
            secure: self.instance.secure(),
            datagram: self.instance.datagram(),
            host: self.host.clone(),
            port: self.port,
            source_address: self.source_string(),
            connection_id: self.connection_id.clone(),
        }
    }

    /// Expands a wildcard host into one endpoint per non-loopback local
    /// interface address. Any other host, or a host with no usable interface,
    /// yields this endpoint alone.
    pub fn expand_if_wildcard(&self, resolver: &dyn AddressResolver) -> Vec<Self> {
        if !is_wildcard(&self.host) {
            return vec![self.clone()];
        }
        let hosts = resolver.local_addresses(self.instance.protocol_support(), false);
        if hosts.is_empty() {
            return vec![self.clone()];
        }
        debug!(endpoint = %self, count = hosts.len(), "expanded wildcard endpoint");
        hosts
            .into_iter()
            .map(|ip| self.with_host_port(ip.to_string(), self.port))
            .collect()
    }

    /// Works out what an adapter bound to this endpoint should advertise.
    ///
    /// An empty host is never expanded and publishes nothing. Otherwise the
    /// host is resolved in order: a single address keeps this endpoint and
    /// publishes it whatever its port; several addresses give one endpoint
    /// each, and this endpoint is published only when its port is fixed.
    pub async fn expand_host(&self, resolver: &dyn AddressResolver) -> Result<(Vec<Self>, Option<Self>)> {
        if self.host.is_empty() {
            return Ok((vec![self.clone()], None));
        }

        let request = ResolveRequest::for_instance(&self.instance, EndpointSelection::Ordered);
        let addresses = resolver.resolve(&self.host, self.port, request).await?;
        if addresses.len() == 1 {
            return Ok((vec![self.clone()], Some(self.clone())));
        }

        let publish = if self.port > 0 { Some(self.clone()) } else { None };
        debug!(endpoint = %self, count = addresses.len(), "expanded multi-homed host");
        let endpoints = addresses
            .iter()
            .map(|addr| self.with_host_port(addr.ip().to_string(), addr.port()))
            .collect();
        Ok((endpoints, publish))
    }

    pub fn connectors(&self, addresses: &[SocketAddr], proxy: Option<&NetworkProxy>) -> Vec<Connector> {
        let params = self.params.connector_params();
        addresses
            .iter()
            .map(|addr| {
                Connector::new(
                    self.instance.type_code(),
                    self.instance.protocol(),
                    *addr,
                    self.source_address,
                    self.connection_id.clone(),
                    proxy.cloned(),
                    params.clone(),
                )
            })
            .collect()
    }

    pub async fn connectors_async(
        &self,
        resolver: &dyn AddressResolver,
        selection: EndpointSelection,
        proxy: Option<&NetworkProxy>,
    ) -> Result<Vec<Connector>> {
        let request = ResolveRequest::for_instance(&self.instance, selection);
        let addresses = resolver.resolve(&self.host, self.port, request).await?;
        Ok(self.connectors(&addresses, proxy))
    }
}

impl<P: TransportParams> PartialEq for IpEndpoint<P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<P: TransportParams> Eq for IpEndpoint<P> {}

impl<P: TransportParams> PartialOrd for IpEndpoint<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: TransportParams> Ord for IpEndpoint<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instance
            .type_code()
            .cmp(&other.instance.type_code())
            .then_with(|| self.host.cmp(&other.host))
            .then_with(|| self.port.cmp(&other.port))
            .then_with(|| self.source_string().cmp(&other.source_string()))
            .then_with(|| self.connection_id.cmp(&other.connection_id))
            .then_with(|| self.params.cmp(&other.params))
    }
}

impl<P: TransportParams> Hash for IpEndpoint<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_value());
    }
}

impl<P: TransportParams> fmt::Display for IpEndpoint<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.instance.protocol(), self.options())
    }
}

#[async_trait]
impl<P: TransportParams> Endpoint for IpEndpoint<P> {
    fn type_code(&self) -> i16 {
        self.instance.type_code()
    }

    fn protocol(&self) -> &str {
        self.instance.protocol()
    }

    fn secure(&self) -> bool {
        self.instance.secure()
    }

    fn datagram(&self) -> bool {
        self.instance.datagram()
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn source_address(&self) -> Option<IpAddr> {
        self.source_address
    }

    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn info(&self) -> EndpointInfo {
        IpEndpoint::info(self)
    }

    fn options(&self) -> String {
        IpEndpoint::options(self)
    }

    fn hash_value(&self) -> i32 {
        IpEndpoint::hash_value(self)
    }

    fn compare(&self, other: &dyn Endpoint) -> Ordering {
        match self.type_code().cmp(&other.type_code()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match other.as_any().downcast_ref::<IpEndpoint<P>>() {
            Some(other) => self.cmp(other),
            // Same type code registered with two parameter types; fall back
            // to the textual form so the order stays total.
            None => self.to_string().cmp(&other.to_string()),
        }
    }

    fn write_to(&self, out: &mut OutputStream) {
        IpEndpoint::write_to(self, out)
    }

    fn with_connection_id(&self, connection_id: &str) -> EndpointRef {
        Arc::new(IpEndpoint::with_connection_id(self, connection_id))
    }

    fn expand_if_wildcard(&self, resolver: &dyn AddressResolver) -> Vec<EndpointRef> {
        IpEndpoint::expand_if_wildcard(self, resolver)
            .into_iter()
            .map(|e| Arc::new(e) as EndpointRef)
            .collect()
    }

    async fn expand_host(&self, resolver: &dyn AddressResolver) -> Result<Expansion> {
        let (endpoints, publish) = IpEndpoint::expand_host(self, resolver).await?;
        Ok((
            endpoints.into_iter().map(|e| Arc::new(e) as EndpointRef).collect(),
            publish.map(|e| Arc::new(e) as EndpointRef),
        ))
    }

    fn connectors(&self, addresses: &[SocketAddr], proxy: Option<&NetworkProxy>) -> Vec<Connector> {
        IpEndpoint::connectors(self, addresses, proxy)
    }

    async fn connectors_async(
        &self,
        resolver: &dyn AddressResolver,
        selection: EndpointSelection,
        proxy: Option<&NetworkProxy>,
    ) -> Result<Vec<Connector>> {
        IpEndpoint::connectors_async(self, resolver, selection, proxy).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Accumulates parsed options; [`finalize`](Self::finalize) turns them into an
/// endpoint or fails, so a half-validated endpoint never escapes.
#[derive(Debug, Clone)]
pub struct IpEndpointBuilder<P: TransportParams = NoParams> {
    instance: Arc<ProtocolInstance>,
    host: Option<String>,
    port: u16,
    source_address: Option<IpAddr>,
    connection_id: String,
    params: P,
    description: String,
}

impl<P: TransportParams> IpEndpointBuilder<P> {
    pub fn new(instance: Arc<ProtocolInstance>) -> Self {
        let params = P::from_instance(&instance);
        let description = format!("`{}'", instance.protocol());
        Self {
            instance,
            host: None,
            port: 0,
            source_address: None,
            connection_id: String::new(),
            params,
            description,
        }
    }

    pub fn connection_id(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = connection_id.into();
        self
    }

    /// Consumes the options this endpoint type recognizes.
    ///
    /// `endpoint` is the original endpoint string, quoted in error messages.
    /// Returns the tokens nobody recognized, in order.
    pub fn parse_options(&mut self, args: &[String], endpoint: &str) -> Result<Vec<String>> {
        self.description = endpoint.to_string();
        walk_options(args, |option, argument| self.check_option(option, argument, endpoint))
    }

    fn check_option(&mut self, option: &str, argument: Option<&str>, endpoint: &str) -> Result<bool> {
        match option {
            "-h" => {
                self.host = Some(require_token(option, argument, endpoint)?.to_string());
            }
            "-p" => {
                let argument = require_argument(option, argument, endpoint)?;
                let port: i64 = argument.parse().map_err(|_| {
                    Error::parse(format!("invalid port value `{}' in endpoint {}", argument, endpoint))
                })?;
                self.port = u16::try_from(port).map_err(|_| {
                    Error::parse(format!("port value `{}' out of range in endpoint {}", argument, endpoint))
                })?;
            }
            "--sourceAddress" => {
                let argument = require_argument(option, argument, endpoint)?;
                let addr = numeric_address(argument).ok_or_else(|| {
                    Error::parse(format!(
                        "invalid IP address provided for --sourceAddress option in endpoint {}",
                        endpoint
                    ))
                })?;
                self.source_address = Some(addr);
            }
            _ => return self.params.check_option(option, argument, endpoint),
        }
        Ok(true)
    }

    /// Applies defaults and context rules.
    ///
    /// Adapter endpoints accept `-h *` (stored as the empty wildcard host) and
    /// reject `--sourceAddress`; outgoing endpoints reject `-h *` and inherit
    /// the default source address.
    pub fn finalize(self, is_adapter_endpoint: bool) -> Result<IpEndpoint<P>> {
        let mut host = self.host.unwrap_or_default();
        if host.is_empty() {
            host = self.instance.default_host().unwrap_or_default().to_string();
        } else if host == "*" {
            if is_adapter_endpoint {
                host.clear();
            } else {
                return Err(Error::parse(format!(
                    "`-h *' not valid for proxy endpoint {}",
                    self.description
                )));
            }
        }

        let source_address = match self.source_address {
            Some(_) if is_adapter_endpoint => {
                return Err(Error::parse(format!(
                    "`--sourceAddress' not valid for object adapter endpoint {}",
                    self.description
                )));
            }
            Some(addr) => Some(addr),
            None if is_adapter_endpoint => None,
            None => self.instance.default_source_address(),
        };

        Ok(IpEndpoint::new(
            self.instance,
            host,
            self.port,
            source_address,
            self.connection_id,
            self.params,
        ))
    }
}
