//! Outbound address guard for health checks.
//!
//! Checks must not be usable to reach internal infrastructure, so every
//! address a check would connect to is checked here: IP-literal targets before
//! the request is built, hostnames inside the client's DNS resolver.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid target URL: {0}")]
    InvalidTarget(String),

    #[error("connection to {0} is prohibited (loopback, private or link-local address)")]
    AddressRejected(IpAddr),

    #[error("{0} only resolves to prohibited addresses")]
    AllAddressesRejected(String),
}

/// Decides which destination addresses a health check may connect to
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetGuard {
    allow_private: bool,
}

impl TargetGuard {
    pub fn new(allow_private: bool) -> Self {
        Self { allow_private }
    }

    pub fn permits(&self, ip: IpAddr) -> bool {
        self.allow_private || !is_internal(ip)
    }

    /// Parse the target and reject IP literals that point inward.
    /// Hostnames pass here and are checked at resolution time.
    pub fn check_target(&self, target: &str) -> Result<Url, ProbeError> {
        let url = Url::parse(target).map_err(|e| ProbeError::InvalidTarget(e.to_string()))?;

        let ip = match url.host() {
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
            Some(Host::Domain(_)) => return Ok(url),
            None => return Err(ProbeError::InvalidTarget(format!("{target} has no host"))),
        };

        if self.permits(ip) { Ok(url) } else { Err(ProbeError::AddressRejected(ip)) }
    }

    /// Keep the permitted addresses, failing when none remain
    pub fn filter_addrs(
        &self,
        host: &str,
        addrs: impl IntoIterator<Item = SocketAddr>,
    ) -> Result<Vec<SocketAddr>, ProbeError> {
        let allowed: Vec<SocketAddr> =
            addrs.into_iter().filter(|addr| self.permits(addr.ip())).collect();

        if allowed.is_empty() {
            return Err(ProbeError::AllAddressesRejected(host.to_string()));
        }
        Ok(allowed)
    }
}

/// Loopback, private, link-local or unspecified, including IPv4-mapped IPv6
pub fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_v4(v4),
            None => is_internal_v6(v6),
        },
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified() || ip.is_unique_local() || ip.is_unicast_link_local()
}

/// DNS resolver for the checker client that drops prohibited addresses
#[derive(Debug, Clone, Copy)]
pub struct GuardedResolver {
    guard: TargetGuard,
}

impl GuardedResolver {
    pub fn new(guard: TargetGuard) -> Self {
        Self { guard }
    }
}

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let guard = self.guard;
        Box::pin(async move {
            let host = name.as_str().to_string();
            let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
            let allowed = guard.filter_addrs(&host, resolved)?;
            let addrs: Addrs = Box::new(allowed.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
