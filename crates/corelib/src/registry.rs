//! Endpoint factories keyed by transport type code.
//!
//! Transports register once at start-up; afterwards the registry is only
//! read. Endpoint strings are dispatched on their leading protocol name and
//! wire endpoints on their type code.

use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::endpoint::{EndpointRef, IpEndpoint, IpEndpointBuilder, TransportParams};
use crate::error::{Error, Result};
use crate::options::{describe, split_tokens};
use crate::protocol::{NetworkConfig, ProtocolInstance};
use crate::wire::{InputStream, OutputStream};

/// Builds endpoints of one transport.
pub trait EndpointFactory: Send + Sync {
    fn type_code(&self) -> i16;

    fn protocol(&self) -> &str;

    /// Parses `args` (the tokens after the protocol name). Recognized tokens
    /// are removed; whatever is left in `args` was not understood.
    fn create(&self, args: &mut Vec<String>, is_adapter_endpoint: bool) -> Result<EndpointRef>;

    /// Decodes an endpoint body (host, port, trailer).
    fn read(&self, input: &mut InputStream<'_>) -> Result<EndpointRef>;
}

/// [`EndpointFactory`] for [`IpEndpoint`]s with parameters `P`.
pub struct IpEndpointFactory<P: TransportParams> {
    instance: Arc<ProtocolInstance>,
    _params: PhantomData<fn() -> P>,
}

impl<P: TransportParams> IpEndpointFactory<P> {
    pub fn new(instance: Arc<ProtocolInstance>) -> Self {
        Self {
            instance,
            _params: PhantomData,
        }
    }

    pub fn instance(&self) -> &Arc<ProtocolInstance> {
        &self.instance
    }
}

impl<P: TransportParams> EndpointFactory for IpEndpointFactory<P> {
    fn type_code(&self) -> i16 {
        self.instance.type_code()
    }

    fn protocol(&self) -> &str {
        self.instance.protocol()
    }

    fn create(&self, args: &mut Vec<String>, is_adapter_endpoint: bool) -> Result<EndpointRef> {
        let endpoint = describe(self.instance.protocol(), args);
        let mut builder = IpEndpointBuilder::<P>::new(Arc::clone(&self.instance));
        *args = builder.parse_options(args, &endpoint)?;
        Ok(Arc::new(builder.finalize(is_adapter_endpoint)?))
    }

    fn read(&self, input: &mut InputStream<'_>) -> Result<EndpointRef> {
        Ok(Arc::new(IpEndpoint::<P>::read_from(Arc::clone(&self.instance), input)?))
    }
}

/// Maps transport type codes to their factories.
pub struct EndpointRegistry {
    config: Arc<NetworkConfig>,
    factories: DashMap<i16, Arc<dyn EndpointFactory>>,
}

impl EndpointRegistry {
    pub fn new(config: Arc<NetworkConfig>) -> Self {
        Self {
            config,
            factories: DashMap::new(),
        }
    }

    pub fn config(&self) -> &Arc<NetworkConfig> {
        &self.config
    }

    /// Registers `factory` under `type_code`, replacing any previous one.
    pub fn register(&self, type_code: i16, factory: Arc<dyn EndpointFactory>) {
        debug!(type_code, protocol = factory.protocol(), "registering endpoint factory");
        if let Some(previous) = self.factories.insert(type_code, factory) {
            warn!(type_code, protocol = previous.protocol(), "replaced endpoint factory");
        }
    }

    pub fn get(&self, type_code: i16) -> Option<Arc<dyn EndpointFactory>> {
        self.factories.get(&type_code).map(|f| Arc::clone(f.value()))
    }

    pub fn find_protocol(&self, protocol: &str) -> Option<Arc<dyn EndpointFactory>> {
        self.factories
            .iter()
            .find(|entry| entry.value().protocol() == protocol)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Registered type codes in ascending order.
    pub fn type_codes(&self) -> Vec<i16> {
        let mut codes: Vec<i16> = self.factories.iter().map(|entry| *entry.key()).collect();
        codes.sort_unstable();
        codes
    }

    /// Parses a full endpoint string such as `tcp -h host -p 10000`.
    ///
    /// The protocol name `default` stands for the configured default
    /// protocol. Any token the transport does not recognize is an error.
    pub fn create_from_string(&self, spec: &str, is_adapter_endpoint: bool) -> Result<EndpointRef> {
        let mut args = split_tokens(spec)?;
        if args.is_empty() {
            return Err(Error::Parse("value has no non-whitespace characters".to_string()));
        }

        let mut protocol = args.remove(0);
        if protocol == "default" {
            protocol = self.config.default_protocol.clone();
        }

        let factory = self
            .find_protocol(&protocol)
            .ok_or_else(|| Error::Parse(format!("unknown protocol `{}' in endpoint `{}'", protocol, spec)))?;

        let endpoint = factory.create(&mut args, is_adapter_endpoint)?;
        if let Some(first) = args.first() {
            return Err(Error::Parse(format!(
                "unrecognized argument `{}' in endpoint `{}'",
                first, spec
            )));
        }
        Ok(endpoint)
    }

    /// Decodes an endpoint body of the transport `type_code`.
    pub fn create_from_wire(&self, type_code: i16, input: &mut InputStream<'_>) -> Result<EndpointRef> {
        let factory = self.get(type_code).ok_or(Error::UnknownTransport { type_code })?;
        factory.read(input)
    }

    /// Writes `endpoint` as it appears inside a proxy: the type code followed
    /// by an encapsulation holding the endpoint body.
    pub fn write_endpoint(&self, endpoint: &EndpointRef, out: &mut OutputStream) {
        out.write_i16(endpoint.type_code());
        out.write_encapsulation(|body| endpoint.write_to(body));
    }

    /// Reads one framed endpoint.
    ///
    /// An unknown type code consumes the whole frame before failing with
    /// [`Error::UnknownTransport`], so the caller can skip it and keep reading.
    pub fn read_endpoint(&self, input: &mut InputStream<'_>) -> Result<EndpointRef> {
        let type_code = input.read_i16()?;
        let mut body = input.read_encapsulation()?;
        let endpoint = self.create_from_wire(type_code, &mut body)?;
        if !body.is_empty() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after {} endpoint",
                body.remaining(),
                endpoint.protocol()
            )));
        }
        Ok(endpoint)
    }

    /// Writes a size-prefixed endpoint list.
    pub fn write_endpoints(&self, endpoints: &[EndpointRef], out: &mut OutputStream) {
        out.write_size(endpoints.len());
        for endpoint in endpoints {
            self.write_endpoint(endpoint, out);
        }
    }

    /// Reads a size-prefixed endpoint list, skipping endpoints of unknown
    /// transports.
    pub fn read_endpoints(&self, input: &mut InputStream<'_>) -> Result<Vec<EndpointRef>> {
        let count = input.read_size()?;
        let mut endpoints = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            match self.read_endpoint(input) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(Error::UnknownTransport { type_code }) => {
                    warn!(type_code, "skipping endpoint of unknown transport");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(endpoints)
    }
}
