//! Address resolution.
//!
//! [`AddressResolver`] has two raw hooks, a name lookup and an interface
//! listing, and builds the selection policy on top of them: literal and
//! wildcard handling, address-family filtering, IPv6 preference and
//! randomization. Resolution is async so one slow lookup never blocks other
//! endpoint work; [`ResolveHandle`] lets a caller abandon it.

use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{ProtocolInstance, ProtocolSupport};

/// Order in which resolved addresses are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointSelection {
    /// Shuffle, spreading clients across a multi-homed host.
    #[default]
    Random,
    /// Keep the order the resolver produced.
    Ordered,
}

/// Parameters of one resolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveRequest {
    pub selection: EndpointSelection,
    pub support: ProtocolSupport,
    pub prefer_ipv6: bool,
}

impl ResolveRequest {
    pub fn new(selection: EndpointSelection) -> Self {
        Self {
            selection,
            support: ProtocolSupport::Both,
            prefer_ipv6: false,
        }
    }

    /// Request using the family settings of `instance`.
    pub fn for_instance(instance: &ProtocolInstance, selection: EndpointSelection) -> Self {
        Self {
            selection,
            support: instance.protocol_support(),
            prefer_ipv6: instance.prefer_ipv6(),
        }
    }
}

/// True for the "any interface" host: empty, `0.0.0.0` or `::`.
pub fn is_wildcard(host: &str) -> bool {
    host.is_empty() || host.parse::<IpAddr>().map(|a| a.is_unspecified()).unwrap_or(false)
}

/// Parses a numeric IP literal. Never performs a lookup.
pub fn numeric_address(host: &str) -> Option<IpAddr> {
    host.parse().ok()
}

/// Loopback addresses allowed by `support`, IPv4 first.
pub fn loopback_addresses(support: ProtocolSupport) -> Vec<IpAddr> {
    let mut out = Vec::with_capacity(2);
    let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
    if support.accepts(&v4) {
        out.push(v4);
    }
    if support.accepts(&v6) {
        out.push(v6);
    }
    out
}

fn is_ipv6_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        IpAddr::V4(_) => false,
    }
}

/// Network-resolution service consumed by endpoints.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Raw name lookup for a host that is neither a literal nor a wildcard.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>>;

    /// Raw list of addresses configured on local interfaces.
    fn interfaces(&self) -> Vec<IpAddr>;

    /// Local interface addresses usable with `support`.
    ///
    /// IPv6 link-local addresses are skipped since they cannot be published
    /// without a scope id.
    fn local_addresses(&self, support: ProtocolSupport, include_loopback: bool) -> Vec<IpAddr> {
        let mut out: Vec<IpAddr> = Vec::new();
        for addr in self.interfaces() {
            if !support.accepts(&addr) || is_ipv6_link_local(&addr) || addr.is_unspecified() {
                continue;
            }
            if addr.is_loopback() && !include_loopback {
                continue;
            }
            if !out.contains(&addr) {
                out.push(addr);
            }
        }
        out
    }

    /// Resolves `host` into socket addresses according to `request`.
    ///
    /// A wildcard host enumerates local interfaces (falling back to loopback)
    /// instead of querying DNS. A specified host that yields no usable address
    /// fails with [`Error::HostNotFound`]; the result is never silently empty.
    async fn resolve(&self, host: &str, port: u16, request: ResolveRequest) -> Result<Vec<SocketAddr>> {
        let mut ips: Vec<IpAddr> = if is_wildcard(host) {
            let local = self.local_addresses(request.support, true);
            if local.is_empty() {
                loopback_addresses(request.support)
            } else {
                local
            }
        } else if let Some(ip) = numeric_address(host) {
            vec![ip]
        } else {
            self.lookup(host).await?
        };

        ips.retain(|ip| request.support.accepts(ip));
        let mut seen = Vec::with_capacity(ips.len());
        ips.retain(|ip| {
            if seen.contains(ip) {
                false
            } else {
                seen.push(*ip);
                true
            }
        });
        if ips.is_empty() {
            return Err(Error::HostNotFound { host: host.to_string() });
        }

        if request.prefer_ipv6 {
            ips.sort_by_key(|ip| !ip.is_ipv6());
        }

        let mut addrs: Vec<SocketAddr> = ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect();
        if request.selection == EndpointSelection::Random {
            addrs.shuffle(&mut rand::thread_rng());
        }
        trace!(host, port, count = addrs.len(), "resolved host");
        Ok(addrs)
    }
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await.map_err(|e| Error::Resolution {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
        Ok(addrs.map(|a| a.ip()).collect())
    }

    fn interfaces(&self) -> Vec<IpAddr> {
        match if_addrs::get_if_addrs() {
            Ok(ifaces) => ifaces.iter().map(|iface| iface.ip()).collect(),
            Err(e) => {
                warn!(error = %e, "failed to enumerate local interfaces");
                Vec::new()
            }
        }
    }
}

/// Resolver answering from a fixed host table.
///
/// Useful for tests and for offline tooling that must not touch DNS.
#[derive(Debug, Default)]
pub struct StaticResolver {
    hosts: RwLock<HashMap<String, Vec<IpAddr>>>,
    interfaces: RwLock<Vec<IpAddr>>,
    delay: Option<Duration>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host: impl Into<String>, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.insert(host, addrs);
        self
    }

    pub fn with_interfaces(self, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        *self.interfaces.write() = addrs.into_iter().collect();
        self
    }

    /// Delays every lookup, simulating a slow name server.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, host: impl Into<String>, addrs: impl IntoIterator<Item = IpAddr>) {
        self.hosts.write().insert(host.into(), addrs.into_iter().collect());
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.hosts
            .read()
            .get(host)
            .cloned()
            .ok_or_else(|| Error::HostNotFound { host: host.to_string() })
    }

    fn interfaces(&self) -> Vec<IpAddr> {
        self.interfaces.read().clone()
    }
}

/// An in-flight resolution running on the tokio runtime.
///
/// Awaiting yields the task's result. After [`cancel`](Self::cancel) it yields
/// [`Error::Cancelled`] and whatever the task would have produced is dropped.
#[derive(Debug)]
pub struct ResolveHandle<T> {
    host: String,
    task: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> ResolveHandle<T> {
    pub fn spawn<F>(host: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            host: host.into(),
            task: tokio::spawn(fut),
        }
    }
}

impl<T> ResolveHandle<T> {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl<T> Future for ResolveHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) if e.is_cancelled() => Poll::Ready(Err(Error::Cancelled)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(Error::Resolution {
                host: this.host.clone(),
                reason: e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard(""));
        assert!(is_wildcard("0.0.0.0"));
        assert!(is_wildcard("::"));
        assert!(!is_wildcard("127.0.0.1"));
        assert!(!is_wildcard("example.com"));
    }

    #[tokio::test]
    async fn test_literal_skips_lookup() {
        let resolver = StaticResolver::new();
        let addrs = resolver
            .resolve("10.1.2.3", 80, ResolveRequest::new(EndpointSelection::Ordered))
            .await
            .unwrap();
        assert_eq!(addrs, vec![SocketAddr::new(ip("10.1.2.3"), 80)]);
    }

    #[tokio::test]
    async fn test_unknown_host_fails() {
        let resolver = StaticResolver::new();
        let err = resolver
            .resolve("nowhere", 80, ResolveRequest::new(EndpointSelection::Ordered))
            .await
            .unwrap_err();
        assert_eq!(err, Error::HostNotFound { host: "nowhere".into() });
    }

    #[tokio::test]
    async fn test_family_filter_can_empty_the_answer() {
        let resolver = StaticResolver::new().with_host("v6only", [ip("::2")]);
        let mut request = ResolveRequest::new(EndpointSelection::Ordered);
        request.support = ProtocolSupport::Ipv4;
        let err = resolver.resolve("v6only", 1, request).await.unwrap_err();
        assert!(matches!(err, Error::HostNotFound { .. }));
    }

    #[tokio::test]
    async fn test_ordered_and_prefer_ipv6() {
        let resolver = StaticResolver::new().with_host("multi", [ip("10.0.0.1"), ip("::5"), ip("10.0.0.2")]);
        let ordered = resolver
            .resolve("multi", 7, ResolveRequest::new(EndpointSelection::Ordered))
            .await
            .unwrap();
        let ips: Vec<IpAddr> = ordered.iter().map(|a| a.ip()).collect();
        assert_eq!(ips, vec![ip("10.0.0.1"), ip("::5"), ip("10.0.0.2")]);

        let mut request = ResolveRequest::new(EndpointSelection::Ordered);
        request.prefer_ipv6 = true;
        let preferred = resolver.resolve("multi", 7, request).await.unwrap();
        let ips: Vec<IpAddr> = preferred.iter().map(|a| a.ip()).collect();
        assert_eq!(ips, vec![ip("::5"), ip("10.0.0.1"), ip("10.0.0.2")]);
    }

    #[tokio::test]
    async fn test_random_keeps_the_same_set() {
        let all: Vec<IpAddr> = (1..=8).map(|i| ip(&format!("10.0.0.{}", i))).collect();
        let resolver = StaticResolver::new().with_host("pool", all.clone());
        let random = resolver
            .resolve("pool", 1, ResolveRequest::new(EndpointSelection::Random))
            .await
            .unwrap();
        let mut got: Vec<IpAddr> = random.iter().map(|a| a.ip()).collect();
        got.sort();
        assert_eq!(got, all);
    }

    #[tokio::test]
    async fn test_wildcard_uses_interfaces() {
        let resolver = StaticResolver::new().with_interfaces([ip("127.0.0.1"), ip("192.168.1.4"), ip("fe80::1")]);
        let addrs = resolver
            .resolve("", 9, ResolveRequest::new(EndpointSelection::Ordered))
            .await
            .unwrap();
        let ips: Vec<IpAddr> = addrs.iter().map(|a| a.ip()).collect();
        assert_eq!(ips, vec![ip("127.0.0.1"), ip("192.168.1.4")]);
    }

    #[tokio::test]
    async fn test_wildcard_falls_back_to_loopback() {
        let resolver = StaticResolver::new();
        let addrs = resolver
            .resolve("0.0.0.0", 9, ResolveRequest::new(EndpointSelection::Ordered))
            .await
            .unwrap();
        assert_eq!(addrs[0], SocketAddr::new(ip("127.0.0.1"), 9));
    }

    #[test]
    fn test_local_addresses_excludes_loopback() {
        let resolver = StaticResolver::new().with_interfaces([ip("127.0.0.1"), ip("10.0.0.9"), ip("::1")]);
        assert_eq!(resolver.local_addresses(ProtocolSupport::Both, false), vec![ip("10.0.0.9")]);
        assert_eq!(resolver.local_addresses(ProtocolSupport::Ipv6, true), vec![ip("::1")]);
    }

    #[tokio::test]
    async fn test_cancelled_handle() {
        let resolver = std::sync::Arc::new(
            StaticResolver::new()
                .with_host("slow", [ip("10.0.0.1")])
                .with_delay(Duration::from_secs(30)),
        );
        let r = resolver.clone();
        let handle = ResolveHandle::spawn("slow", async move {
            r.resolve("slow", 1, ResolveRequest::new(EndpointSelection::Ordered)).await
        });
        handle.cancel();
        assert_eq!(handle.await, Err(Error::Cancelled));
    }
}
