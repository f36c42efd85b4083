//! Datagram transport parameters.
//!
//! `udp` endpoints accept `-c` (connected socket), `-z` (compression),
//! `--ttl <n>` and `--interface <name>` for multicast. Only the compression
//! flag is written to the wire; the multicast settings are local.

use corelib::options::{quote_if_needed, require_argument, require_token};
use corelib::wire::{InputStream, OutputStream};
use corelib::{Error, HashCombiner, IpEndpoint, ProtocolInstance, Result, TransportParams};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UdpParams {
    pub connect: bool,
    pub compress: bool,
    /// Multicast TTL; the default `-1` keeps the system setting.
    pub multicast_ttl: i32,
    pub multicast_interface: String,
}

pub type UdpEndpoint = IpEndpoint<UdpParams>;

impl Default for UdpParams {
    fn default() -> Self {
        Self {
            connect: false,
            compress: false,
            multicast_ttl: -1,
            multicast_interface: String::new(),
        }
    }
}

fn no_argument(option: &str, argument: Option<&str>, endpoint: &str) -> Result<()> {
    match argument {
        Some(argument) => Err(Error::Parse(format!(
            "unexpected argument `{}' provided for {} option in {}",
            argument, option, endpoint
        ))),
        None => Ok(()),
    }
}

impl TransportParams for UdpParams {
    fn from_instance(_instance: &ProtocolInstance) -> Self {
        Self::default()
    }

    fn check_option(&mut self, option: &str, argument: Option<&str>, endpoint: &str) -> Result<bool> {
        match option {
            "-c" => {
                no_argument(option, argument, endpoint)?;
                self.connect = true;
            }
            "-z" => {
                no_argument(option, argument, endpoint)?;
                self.compress = true;
            }
            "--ttl" => {
                let argument = require_argument(option, argument, endpoint)?;
                self.multicast_ttl = argument
                    .parse::<i32>()
                    .ok()
                    .filter(|ttl| *ttl >= 0)
                    .ok_or_else(|| Error::Parse(format!("invalid TTL value `{}' in endpoint {}", argument, endpoint)))?;
            }
            "--interface" => {
                self.multicast_interface = require_token(option, argument, endpoint)?.to_string();
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn append_options(&self, parts: &mut Vec<String>) {
        if self.connect {
            parts.push("-c".to_string());
        }
        if self.compress {
            parts.push("-z".to_string());
        }
        if !self.multicast_interface.is_empty() {
            parts.push("--interface".to_string());
            parts.push(quote_if_needed(&self.multicast_interface));
        }
        if self.multicast_ttl != -1 {
            parts.push("--ttl".to_string());
            parts.push(self.multicast_ttl.to_string());
        }
    }

    fn hash_into(&self, hash: &mut HashCombiner) {
        hash.add_bool(self.connect)
            .add_bool(self.compress)
            .add_i32(self.multicast_ttl)
            .add_str(&self.multicast_interface);
    }

    fn write_trailer(&self, out: &mut OutputStream) {
        out.write_bool(self.compress);
    }

    fn read_trailer(_instance: &ProtocolInstance, input: &mut InputStream<'_>) -> Result<Self> {
        Ok(Self {
            compress: input.read_bool()?,
            ..Self::default()
        })
    }

    fn connector_params(&self) -> String {
        let mut parts = Vec::new();
        if !self.multicast_interface.is_empty() {
            parts.push("--interface".to_string());
            parts.push(quote_if_needed(&self.multicast_interface));
        }
        if self.multicast_ttl != -1 {
            parts.push("--ttl".to_string());
            parts.push(self.multicast_ttl.to_string());
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::options::split_tokens;
    use corelib::NetworkConfig;
    use std::sync::Arc;

    fn instance() -> Arc<ProtocolInstance> {
        Arc::new(ProtocolInstance::new(3, "udp", false, true, Arc::new(NetworkConfig::default())))
    }

    fn parse(s: &str) -> Result<UdpEndpoint> {
        let args = split_tokens(s)?;
        let mut builder = UdpEndpoint::builder(instance());
        let unknown = builder.parse_options(&args, s)?;
        assert!(unknown.is_empty());
        builder.finalize(false)
    }

    #[test]
    fn test_multicast_options() {
        let e = parse("-h 239.255.0.1 -p 10000 --interface eth0 --ttl 5 -z").unwrap();
        assert_eq!(e.params().multicast_interface, "eth0");
        assert_eq!(e.params().multicast_ttl, 5);
        assert_eq!(e.options(), "-h 239.255.0.1 -p 10000 -z --interface eth0 --ttl 5");
    }

    #[test]
    fn test_bad_ttl() {
        let invalid = |s: &str| match parse(s) {
            Err(Error::Parse(msg)) => msg.starts_with("invalid TTL value"),
            _ => false,
        };
        assert!(invalid("-h a --ttl many"));
        assert!(invalid("-h a --ttl 2.5"));
        assert!(invalid("-h a --ttl 4294967296"));
    }

    #[test]
    fn test_negative_ttl_is_not_an_argument() {
        match parse("-h a --ttl -1") {
            Err(Error::Parse(msg)) => assert!(msg.starts_with("no argument provided for --ttl"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(parse("-h a --ttl 0").unwrap().params().multicast_ttl, 0);
        assert_eq!(parse("-h a").unwrap().params().multicast_ttl, -1);
    }

    #[test]
    fn test_only_compress_on_wire() {
        let e = parse("-h a -p 2 -z --ttl 3 -c").unwrap();
        let mut out = OutputStream::new();
        e.write_to(&mut out);
        let mut input = InputStream::new(out.as_slice());
        let decoded = UdpEndpoint::read_from(instance(), &mut input).unwrap();
        assert!(input.is_empty());
        assert!(decoded.params().compress);
        assert_eq!(decoded.params().multicast_ttl, -1);
        assert!(!decoded.params().connect);
        assert_ne!(decoded, e);
    }

    #[test]
    fn test_connector_carries_multicast_settings() {
        let e = parse("-h 239.255.0.1 -p 1 --interface \"fe80::1%eth0\"").unwrap();
        let addr: std::net::SocketAddr = "239.255.0.1:1".parse().unwrap();
        let connectors = e.connectors(&[addr], None);
        assert_eq!(connectors[0].params(), "--interface \"fe80::1%eth0\"");
    }
}
