//! Stream transport parameters, shared by `tcp` and `ssl`.
//!
//! # Options
//!
//! - `-t <ms>` connect timeout in milliseconds, or `-t infinite`
//! - `-z` request compression
//!
//! Both travel on the wire after host and port, as an `i32` timeout and a
//! `bool` compression flag.

use corelib::options::require_argument;
use corelib::wire::{InputStream, OutputStream};
use corelib::{Error, HashCombiner, IpEndpoint, ProtocolInstance, Result, TransportParams};

/// Timeout value meaning "wait forever".
pub const INFINITE_TIMEOUT: i32 = -1;

/// Options of a stream endpoint. Ordered by timeout, then compression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TcpParams {
    pub timeout: i32,
    pub compress: bool,
}

/// Endpoint of the `tcp` and `ssl` transports.
pub type TcpEndpoint = IpEndpoint<TcpParams>;

impl TransportParams for TcpParams {
    fn from_instance(instance: &ProtocolInstance) -> Self {
        Self {
            timeout: instance.default_timeout(),
            compress: false,
        }
    }

    fn check_option(&mut self, option: &str, argument: Option<&str>, endpoint: &str) -> Result<bool> {
        match option {
            "-t" => {
                let argument = require_argument(option, argument, endpoint)?;
                if argument == "infinite" {
                    self.timeout = INFINITE_TIMEOUT;
                } else {
                    self.timeout = argument
                        .parse::<i32>()
                        .ok()
                        .filter(|t| *t >= 1)
                        .ok_or_else(|| {
                            Error::Parse(format!("invalid timeout value `{}' in endpoint {}", argument, endpoint))
                        })?;
                }
            }
            "-z" => {
                if let Some(argument) = argument {
                    return Err(Error::Parse(format!(
                        "unexpected argument `{}' provided for -z option in {}",
                        argument, endpoint
                    )));
                }
                self.compress = true;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn append_options(&self, parts: &mut Vec<String>) {
        parts.push("-t".to_string());
        if self.timeout == INFINITE_TIMEOUT {
            parts.push("infinite".to_string());
        } else {
            parts.push(self.timeout.to_string());
        }
        if self.compress {
            parts.push("-z".to_string());
        }
    }

    fn hash_into(&self, hash: &mut HashCombiner) {
        hash.add_i32(self.timeout).add_bool(self.compress);
    }

    fn write_trailer(&self, out: &mut OutputStream) {
        out.write_i32(self.timeout);
        out.write_bool(self.compress);
    }

    fn read_trailer(_instance: &ProtocolInstance, input: &mut InputStream<'_>) -> Result<Self> {
        let timeout = input.read_i32()?;
        let compress = input.read_bool()?;
        Ok(Self { timeout, compress })
    }

    // Compression is negotiated per connection, only the timeout affects
    // how a connection is opened.
    fn connector_params(&self) -> String {
        if self.timeout == INFINITE_TIMEOUT {
            "-t infinite".to_string()
        } else {
            format!("-t {}", self.timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::options::split_tokens;
    use corelib::NetworkConfig;
    use std::sync::Arc;

    fn instance() -> Arc<ProtocolInstance> {
        Arc::new(ProtocolInstance::new(1, "tcp", false, false, Arc::new(NetworkConfig::default())))
    }

    fn parse(s: &str) -> Result<TcpEndpoint> {
        let args = split_tokens(s)?;
        let mut builder = TcpEndpoint::builder(instance());
        let unknown = builder.parse_options(&args, s)?;
        assert!(unknown.is_empty());
        builder.finalize(false)
    }

    #[test]
    fn test_default_timeout_from_config() {
        let e = parse("-h a -p 1").unwrap();
        assert_eq!(e.params().timeout, 60_000);
        assert!(!e.params().compress);
        assert_eq!(e.options(), "-h a -p 1 -t 60000");
    }

    #[test]
    fn test_infinite_and_compress() {
        let e = parse("-h a -p 1 -t infinite -z").unwrap();
        assert_eq!(e.params().timeout, INFINITE_TIMEOUT);
        assert!(e.params().compress);
        assert_eq!(e.options(), "-h a -p 1 -t infinite -z");
    }

    #[test]
    fn test_bad_timeout() {
        assert!(matches!(parse("-h a -t 0"), Err(Error::Parse(_))));
        assert!(matches!(parse("-h a -t soon"), Err(Error::Parse(_))));
        assert!(matches!(parse("-h a -t"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_compress_takes_no_argument() {
        assert!(matches!(parse("-h a -z yes"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_timeout_distinguishes_endpoints() {
        let a = parse("-h a -p 1 -t 1000").unwrap();
        let b = parse("-h a -p 1 -t 2000").unwrap();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_trailer_round_trip() {
        let e = parse("-h host -p 9 -t 250 -z").unwrap();
        let mut out = OutputStream::new();
        e.write_to(&mut out);
        assert_eq!(&out.as_slice()[out.len() - 5..], &[250, 0, 0, 0, 1]);

        let mut input = InputStream::new(out.as_slice());
        let decoded = TcpEndpoint::read_from(instance(), &mut input).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn test_connector_params_ignore_compression() {
        let plain = parse("-h a -p 1 -t 500").unwrap();
        let compressed = parse("-h a -p 1 -t 500 -z").unwrap();
        let addr: std::net::SocketAddr = "10.0.0.1:1".parse().unwrap();
        assert_eq!(plain.connectors(&[addr], None), compressed.connectors(&[addr], None));
    }
}
