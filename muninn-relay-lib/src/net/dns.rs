use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::lookup_host;
use tracing::{debug, trace, warn};

use crate::config::DnsConfig;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    addresses: Vec<SocketAddr>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Resolved addresses per `(host, port)`, kept for a bounded time.
///
/// The system resolver gives no TTL, so entries live for `max_ttl` (never less
/// than `min_ttl`). When a refresh fails, the stale entry is served instead.
#[derive(Debug)]
pub struct DnsCache {
    entries: DashMap<(String, u16), CacheEntry>,
    min_ttl: Duration,
    max_ttl: Duration,
}

impl Default for DnsCache {
    fn default() -> Self {
        Self::from_config(&DnsConfig::default())
    }
}

impl DnsCache {
    pub fn new(min_ttl: Duration, max_ttl: Duration) -> Self {
        Self { entries: DashMap::new(), min_ttl, max_ttl }
    }

    pub fn from_config(cfg: &DnsConfig) -> Self {
        Self::new(Duration::from_secs(cfg.min_ttl_secs), Duration::from_secs(cfg.max_ttl_secs))
    }

    /// Addresses for `host:port`. IP literals are returned as-is without caching.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        let key = (host.to_ascii_lowercase(), port);
        if let Some(entry) = self.entries.get(&key) {
            let snapshot = entry.value().clone();
            drop(entry);
            if !snapshot.is_expired() {
                trace!(%host, port, "dns cache hit");
                return Ok(snapshot.addresses);
            }
        }

        match self.resolve_and_cache(key.clone()).await {
            Ok(addresses) => Ok(addresses),
            Err(e) => {
                if let Some(entry) = self.entries.get(&key) {
                    warn!(%host, error = %e, "dns resolve failed, using stale cache");
                    return Ok(entry.addresses.clone());
                }
                Err(e)
            }
        }
    }

    async fn resolve_and_cache(&self, key: (String, u16)) -> Result<Vec<SocketAddr>> {
        let (host, port) = (&key.0, key.1);
        debug!(%host, port, "resolving");
        let resolution_error =
            |reason: String| RelayError::ResolutionError { host: host.clone(), reason };
        let lookup = lookup_host((host.as_str(), port))
            .await
            .map_err(|e| resolution_error(e.to_string()))?;
        let addresses: Vec<SocketAddr> = lookup.collect();
        if addresses.is_empty() {
            return Err(resolution_error("no addresses found".to_string()));
        }

        let ttl = self.max_ttl.max(self.min_ttl);
        let now = Instant::now();
        self.purge_stale(now, ttl);
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries
            .insert(key.clone(), CacheEntry { addresses: addresses.clone(), expires_at });

        trace!(%host, ?addresses, "dns cache updated");
        Ok(addresses)
    }

    /// Drop entries expired for longer than `grace`. Entries inside the grace
    /// window are kept as a fallback for failed refreshes.
    fn purge_stale(&self, now: Instant, grace: Duration) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.expires_at.checked_add(grace).is_none_or(|deadline| deadline > now)
        });
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            trace!(purged, "dns cache purged stale entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
