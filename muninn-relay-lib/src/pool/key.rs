use std::fmt;

use crate::net::ProxyRoute;

/// Identity of an upstream connection: (host, port, profile id, proxy route).
///
/// Connections are only reused for the exact same identity, so a handshake
/// negotiated with one profile or route never serves a request for another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    host: String,
    port: u16,
    profile: String,
    proxy: Option<ProxyRoute>,
}

impl PoolKey {
    pub fn new(host: &str, port: u16, profile: &str, proxy: Option<ProxyRoute>) -> Self {
        Self { host: host.to_ascii_lowercase(), port, profile: profile.to_string(), proxy }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn proxy(&self) -> Option<&ProxyRoute> {
        self.proxy.as_ref()
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.authority(), self.profile)?;
        if let Some(proxy) = &self.proxy {
            write!(f, " via {proxy}")?;
        }
        Ok(())
    }
}
