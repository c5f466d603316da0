//! Target Resolver - asset target selection and host-name resolution
//!
//! An asset is probed at the first non-empty of its IP address, domain and
//! name. Resolution of that string happens here so every executor reports
//! unresolvable hosts the same way.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;
use vantage_common::{Asset, ProbeError, ProbeResult};

pub struct TargetResolver;

impl TargetResolver {
    pub fn new() -> Self { Self }

    /// Probe target for an asset: IP, else domain, else name.
    ///
    /// An asset with all three empty yields an empty string, which then
    /// fails resolution deterministically.
    pub fn target_of(asset: &Asset) -> String {
        [asset.ip.as_deref(), asset.domain.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(asset.name.trim())
            .to_string()
    }

    /// Resolve a host to one address, preferring IPv4.
    ///
    /// Literal addresses short-circuit. Names go through the system resolver
    /// inside `tokio::task::spawn_blocking` so the runtime never blocks, and
    /// the lookup is bounded by `limit`.
    pub async fn resolve(host: &str, limit: Duration) -> ProbeResult<IpAddr> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ProbeError::Resolution("<empty target>".to_string()));
        }
        if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
            return Ok(ip);
        }

        let name = host.to_string();
        let lookup = tokio::task::spawn_blocking(move || {
            (name.as_str(), 0)
                .to_socket_addrs()
                .map(|addrs| addrs.map(|a| a.ip()).collect::<Vec<IpAddr>>())
        });

        let addrs = match tokio::time::timeout(limit, lookup).await {
            Ok(Ok(Ok(addrs))) => addrs,
            Ok(Ok(Err(e))) => {
                debug!("lookup of {} failed: {}", host, e);
                Vec::new()
            }
            Ok(Err(join)) => return Err(ProbeError::Unexpected(format!("resolver task failed: {join}"))),
            Err(_) => {
                debug!("lookup of {} exceeded {:?}", host, limit);
                Vec::new()
            }
        };

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ProbeError::Resolution(host.to_string()))
    }

    pub async fn resolve_socket(host: &str, port: u16, limit: Duration) -> ProbeResult<SocketAddr> {
        Self::resolve(host, limit).await.map(|ip| SocketAddr::new(ip, port))
    }
}

impl Default for TargetResolver { fn default() -> Self { Self::new() } }

/// Host part of a URL: IPv6 literals need brackets.
pub fn url_host(target: &str) -> String {
    match target.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("[{v6}]"),
        _ => target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use vantage_common::AssetCategory;

    #[test]
    fn target_priority_is_ip_domain_name() {
        let asset = Asset::new(1, "edge-router", AssetCategory::NetworkDevice);
        assert_eq!(TargetResolver::target_of(&asset), "edge-router");

        let asset = asset.with_domain("router.example.org");
        assert_eq!(TargetResolver::target_of(&asset), "router.example.org");

        let asset = asset.with_ip("192.0.2.1");
        assert_eq!(TargetResolver::target_of(&asset), "192.0.2.1");
    }

    #[test]
    fn blank_fields_are_skipped() {
        let asset = Asset::new(1, "fallback", AssetCategory::Generic)
            .with_ip("")
            .with_domain("   ");
        assert_eq!(TargetResolver::target_of(&asset), "fallback");
    }

    #[tokio::test]
    async fn literal_ip_resolves_without_lookup() {
        let ip = TargetResolver::resolve("8.8.8.8", Duration::from_secs(1)).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[tokio::test]
    async fn empty_target_fails_resolution() {
        let err = TargetResolver::resolve("", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProbeError::Resolution(_)));
    }

    #[tokio::test]
    async fn invalid_tld_fails_resolution() {
        let err = TargetResolver::resolve("no.such.host.invalid", Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot resolve host"));
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(url_host("::1"), "[::1]");
        assert_eq!(url_host("203.0.113.10"), "203.0.113.10");
        assert_eq!(url_host("example.org"), "example.org");
    }
}
