//! Integration tests for the default transports.
//!
//! # Test Strategy
//!
//! 1. **Parsing**: endpoint strings through the registry
//! 2. **Wire**: framed encoding of mixed endpoint lists
//! 3. **Properties**: string and wire round trips over generated endpoints

use std::sync::Arc;

use corelib::{EndpointRef, Error, InputStream, NetworkConfig, OutputStream, StaticResolver};
use proptest::prelude::*;
use transports::{default_registry, TcpEndpoint, TcpParams, SSL_TYPE, TCP_TYPE, UDP_TYPE};

fn registry() -> corelib::EndpointRegistry {
    default_registry(NetworkConfig::default())
}

// ============================================================================
// Parsing Tests
// ============================================================================

#[test]
fn test_default_transports_registered() {
    let registry = registry();
    assert_eq!(registry.type_codes(), vec![TCP_TYPE, SSL_TYPE, UDP_TYPE]);
}

#[test]
fn test_tcp_endpoint_fields() {
    let e = registry().create_from_string("tcp -h 127.0.0.1 -p 10000", false).unwrap();
    assert_eq!(e.type_code(), TCP_TYPE);
    assert_eq!(e.protocol(), "tcp");
    assert!(!e.secure());
    assert!(!e.datagram());
    assert_eq!(e.to_string(), "tcp -h 127.0.0.1 -p 10000 -t 60000");
    assert_eq!(e.hash_value(), -727136993);
}

#[test]
fn test_ssl_is_secure() {
    let e = registry().create_from_string("ssl -h secure.example -p 443", false).unwrap();
    assert_eq!(e.type_code(), SSL_TYPE);
    assert!(e.secure());
    assert!(!e.datagram());
}

#[test]
fn test_udp_is_datagram() {
    let e = registry().create_from_string("udp -h 239.255.0.1 -p 10000 --ttl 4", false).unwrap();
    assert_eq!(e.type_code(), UDP_TYPE);
    assert!(e.datagram());
    assert!(!e.secure());
}

#[test]
fn test_default_protocol() {
    let e = registry().create_from_string("default -h a -p 1", false).unwrap();
    assert_eq!(e.protocol(), "tcp");

    let config = NetworkConfig {
        default_protocol: "ssl".into(),
        ..NetworkConfig::default()
    };
    let e = default_registry(config).create_from_string("default -h a -p 1", false).unwrap();
    assert_eq!(e.protocol(), "ssl");
}

#[test]
fn test_port_out_of_range() {
    let err = registry().create_from_string("tcp -h a -p 70000", false).unwrap_err();
    match err {
        Error::Parse(msg) => {
            assert!(msg.contains("70000"), "{}", msg);
            assert!(msg.contains("tcp -h a -p 70000"), "{}", msg);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unterminated_quote() {
    let err = registry().create_from_string("tcp -h \"unterminated -p 1", false).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn test_udp_option_not_valid_for_tcp() {
    let err = registry().create_from_string("tcp -h a -p 1 --ttl 3", false).unwrap_err();
    assert_eq!(
        err,
        Error::Parse("unrecognized argument `--ttl' in endpoint `tcp -h a -p 1 --ttl 3'".to_string())
    );
}

#[test]
fn test_timeout_and_compression_do_not_break_equivalence() {
    let registry = registry();
    let fast = registry.create_from_string("tcp -h a -p 1 -t 100", false).unwrap();
    let slow = registry.create_from_string("tcp -h a -p 1 -t 9000 -z", false).unwrap();
    assert!(fast.equivalent(slow.as_ref()));
    assert!(*fast != *slow);

    let secure = registry.create_from_string("ssl -h a -p 1 -t 100", false).unwrap();
    assert!(!fast.equivalent(secure.as_ref()));
}

#[test]
fn test_default_timeout_follows_config() {
    let config = NetworkConfig {
        default_timeout: 2500,
        ..NetworkConfig::default()
    };
    let e = default_registry(config).create_from_string("tcp -h a -p 1", false).unwrap();
    assert_eq!(e.options(), "-h a -p 1 -t 2500");
}

#[tokio::test]
async fn test_tcp_connectors_carry_timeout() {
    let resolver = StaticResolver::new();
    let e = registry().create_from_string("tcp -h 10.0.0.1 -p 80 -t 1500 -z", false).unwrap();
    let connectors = e
        .connectors_async(&resolver, corelib::EndpointSelection::Ordered, None)
        .await
        .unwrap();
    assert_eq!(connectors.len(), 1);
    assert_eq!(connectors[0].params(), "-t 1500");
    assert_eq!(connectors[0].protocol(), "tcp");
}

// ============================================================================
// Wire Tests
// ============================================================================

#[test]
fn test_framed_tcp_layout() {
    let registry = registry();
    let e = registry.create_from_string("tcp -h h -p 1 -t 5", false).unwrap();
    let mut out = OutputStream::new();
    registry.write_endpoint(&e, &mut out);
    assert_eq!(
        out.as_slice(),
        &[
            1, 0, // type code
            17, 0, 0, 0, 1, 1, // encapsulation header
            1, b'h', // host
            1, 0, 0, 0, // port
            5, 0, 0, 0, // timeout
            0, // compress
        ]
    );
}

#[test]
fn test_mixed_list_round_trip() {
    let registry = registry();
    let endpoints: Vec<EndpointRef> = [
        "tcp -h a -p 1",
        "ssl -h b -p 2 -t infinite",
        "udp -h c -p 3 -z",
    ]
    .iter()
    .map(|s| registry.create_from_string(s, false).unwrap())
    .collect();

    let mut out = OutputStream::new();
    registry.write_endpoints(&endpoints, &mut out);
    let mut input = InputStream::new(out.as_slice());
    let decoded = registry.read_endpoints(&mut input).unwrap();
    assert!(input.is_empty());
    assert_eq!(decoded, endpoints);
}

#[test]
fn test_truncated_frame_fails() {
    let registry = registry();
    let e = registry.create_from_string("tcp -h a -p 1", false).unwrap();
    let mut out = OutputStream::new();
    registry.write_endpoint(&e, &mut out);
    let bytes = out.as_slice();
    let mut input = InputStream::new(&bytes[..bytes.len() - 2]);
    assert!(matches!(registry.read_endpoint(&mut input), Err(Error::Decode(_))));
}

#[test]
fn test_generic_endpoint_usable_directly() {
    let registry = registry();
    let factory = registry.get(TCP_TYPE).unwrap();
    let e = factory.create(&mut vec!["-h".into(), "x".into()], false).unwrap();
    let tcp = e.as_any().downcast_ref::<TcpEndpoint>().unwrap();
    assert_eq!(tcp.params(), &TcpParams { timeout: 60_000, compress: false });
}

// ============================================================================
// Property Tests
// ============================================================================

fn arb_spec() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["tcp", "ssl", "udp"]),
        prop::sample::select(vec!["localhost", "10.0.0.1", "\"::1\"", "\"fe80::1%eth0\"", "server.example"]),
        any::<u16>(),
        any::<bool>(),
        prop::option::of(1i32..100_000),
    )
        .prop_map(|(protocol, host, port, compress, timeout)| {
            let mut spec = format!("{} -h {} -p {}", protocol, host, port);
            if compress {
                spec.push_str(" -z");
            }
            if let (Some(timeout), true) = (timeout, protocol != "udp") {
                spec.push_str(&format!(" -t {}", timeout));
            }
            spec
        })
}

proptest! {
    /// Property: parse(to_string(e)) == e
    #[test]
    fn prop_string_round_trip(spec in arb_spec()) {
        let registry = registry();
        let e = registry.create_from_string(&spec, false).unwrap();
        let again = registry.create_from_string(&e.to_string(), false).unwrap();
        prop_assert_eq!(again.hash_value(), e.hash_value());
        prop_assert!(*again == *e, "{} != {}", again, e);
    }

    /// Property: wire decoding preserves every field that is encoded
    #[test]
    fn prop_wire_round_trip(spec in arb_spec()) {
        let registry = registry();
        let e = registry.create_from_string(&spec, false).unwrap();
        let mut out = OutputStream::new();
        registry.write_endpoint(&e, &mut out);
        let mut input = InputStream::new(out.as_slice());
        let decoded = registry.read_endpoint(&mut input).unwrap();
        prop_assert!(input.is_empty());
        prop_assert_eq!(decoded.host(), e.host());
        prop_assert_eq!(decoded.port(), e.port());
        prop_assert!(*decoded == *e, "{} != {}", decoded, e);
    }
}

#[test]
fn test_shared_endpoints_across_threads() {
    let e: EndpointRef = registry().create_from_string("tcp -h shared -p 9", false).unwrap();
    let expected = e.hash_value();
    let hashes: Vec<i32> = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let e = Arc::clone(&e);
                s.spawn(move |_| e.hash_value())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();
    assert!(hashes.iter().all(|h| *h == expected));
}
