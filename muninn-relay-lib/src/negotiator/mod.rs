//! Turns (host, port, profile, proxy route) into a live HTTP connection whose
//! TLS handshake carries the profile's fingerprint.

mod handle;

pub use handle::{ConnectionHandle, HttpSender, ALPN_H2};

use ahash::AHashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{Config, TimeoutConfig};
use crate::error::{RelayError, Result};
use crate::net::{boxed, connect_any, DnsCache, ProxyRoute};
use crate::pool::PoolKey;
use crate::profile::{FingerprintProfile, ProfileStore};
use crate::telemetry::metrics::values;
use crate::telemetry::{LiveConnectionGuard, Metrics};
use crate::tls::ProfileConnector;

/// Opens new connections for the pool.
///
/// [`Negotiator`] is the production implementation; the seam exists so the
/// pool and dispatcher can run against in-memory connections.
pub trait Connect: Send + Sync + 'static {
    fn connect(
        &self,
        key: &PoolKey,
        profile: &Arc<FingerprintProfile>,
        timeout: Duration,
    ) -> impl Future<Output = Result<ConnectionHandle>> + Send;
}

/// Time left before `deadline`, capped at `limit`.
fn budget(deadline: Instant, limit: Duration) -> Duration {
    deadline.saturating_duration_since(Instant::now()).min(limit)
}

/// Opens fingerprinted connections for the profiles of one [`ProfileStore`].
///
/// TLS connectors are built up front and looked up by profile id, so the
/// negotiator only serves the store it was built from. Pools and dispatchers
/// handing it profiles must share that store; [`covers`](Self::covers) checks
/// it.
pub struct Negotiator {
    dns: DnsCache,
    connectors: AHashMap<String, ProfileConnector>,
    timeouts: TimeoutConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Negotiator {
    /// Build one TLS connector per profile in `store`.
    ///
    /// A profile BoringSSL refuses to configure fails the whole startup with
    /// [`RelayError::InvalidProfileDefinition`].
    pub fn new(store: &ProfileStore, config: &Config, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let mut connectors = AHashMap::with_capacity(store.len());
        for profile in store.iter() {
            let connector = ProfileConnector::new(Arc::clone(profile), &config.tls)?;
            connectors.insert(profile.id().to_string(), connector);
        }
        if !config.tls.verify {
            warn!("upstream certificate verification is disabled");
        }
        info!(connectors = connectors.len(), "negotiator ready");
        Ok(Self {
            dns: DnsCache::from_config(&config.dns),
            connectors,
            timeouts: config.timeout.clone(),
            metrics,
        })
    }

    /// Resolve, connect (optionally through `proxy`), handshake, and start HTTP.
    ///
    /// The whole negotiation is bounded by `timeout`; TCP connect and TLS
    /// handshake are additionally bounded by their configured limits.
    pub async fn negotiate(
        &self,
        host: &str,
        port: u16,
        profile: &Arc<FingerprintProfile>,
        proxy: Option<&ProxyRoute>,
        timeout: Duration,
    ) -> Result<ConnectionHandle> {
        let key = PoolKey::new(host, port, profile.id(), proxy.cloned());
        self.negotiate_key(key, profile, timeout).await
    }

    /// Whether every profile in `store` is one this negotiator was built from.
    pub fn covers(&self, store: &ProfileStore) -> bool {
        store.len() == self.connectors.len()
            && store.iter().all(|profile| {
                self.connectors
                    .get(profile.id())
                    .is_some_and(|c| Arc::ptr_eq(c.profile(), profile))
            })
    }

    async fn negotiate_key(
        &self,
        key: PoolKey,
        profile: &Arc<FingerprintProfile>,
        timeout: Duration,
    ) -> Result<ConnectionHandle> {
        let start = Instant::now();
        let result = self.run(key, profile, start + timeout).await;
        match &result {
            Ok(handle) => {
                let protocol = if handle.alpn() == Some(ALPN_H2) { "h2" } else { "http/1.1" };
                debug!(
                    handle_id = handle.id(),
                    key = %handle.key(),
                    protocol,
                    elapsed_ms = start.elapsed().as_millis(),
                    "connection negotiated"
                );
                if let Some(m) = &self.metrics {
                    m.record_handshake(profile.id(), protocol, start.elapsed().as_secs_f64());
                }
            }
            Err(e) => {
                debug!(profile = %profile.id(), error = %e, "negotiation failed");
                if let Some(m) = &self.metrics {
                    m.record_handshake_error(profile.id(), e.error_type());
                }
            }
        }
        result
    }

    async fn run(
        &self,
        key: PoolKey,
        profile: &Arc<FingerprintProfile>,
        deadline: Instant,
    ) -> Result<ConnectionHandle> {
        let connector = self
            .connectors
            .get(profile.id())
            .ok_or_else(|| RelayError::ProfileNotFound(profile.id().to_string()))?;
        let target = key.authority();

        let (dial_host, dial_port) = match key.proxy() {
            Some(route) => (route.host(), route.port()),
            None => (key.host(), key.port()),
        };
        let resolve_budget = budget(deadline, self.timeouts.connect());
        let addrs = tokio::time::timeout(resolve_budget, self.dns.resolve(dial_host, dial_port))
            .await
            .map_err(|_| RelayError::ResolutionError {
                host: dial_host.to_string(),
                reason: format!("timed out after {} ms", resolve_budget.as_millis()),
            })??;

        let dial_label = format!("{dial_host}:{dial_port}");
        let tcp = connect_any(&dial_label, &addrs, budget(deadline, self.timeouts.connect()))
            .await
            .inspect_err(|_| self.record_timeout_if_elapsed(deadline, values::TIMEOUT_CONNECT))?;

        let stream = match key.proxy() {
            Some(route) => {
                let tunnel_budget = budget(deadline, self.timeouts.connect());
                tokio::time::timeout(
                    tunnel_budget,
                    route.establish_tunnel(tcp, key.host(), key.port()),
                )
                .await
                .map_err(|_| {
                    self.record_timeout(values::TIMEOUT_CONNECT);
                    RelayError::ConnectError {
                        target: target.clone(),
                        reason: format!("proxy {route} did not answer within {} ms", tunnel_budget.as_millis()),
                    }
                })??
            }
            None => boxed(tcp),
        };

        let tls_budget = budget(deadline, self.timeouts.tls_handshake());
        let tls = tokio::time::timeout(tls_budget, connector.handshake(key.host(), stream))
            .await
            .map_err(|_| {
                self.record_timeout(values::TIMEOUT_TLS_HANDSHAKE);
                RelayError::HandshakeError {
                    host: key.host().to_string(),
                    reason: format!("timed out after {} ms", tls_budget.as_millis()),
                }
            })??;

        let alpn = tls
            .ssl()
            .selected_alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned());
        let live = LiveConnectionGuard::new(self.metrics.as_ref().map(|m| m.connections_live.clone()));

        let host = key.host().to_string();
        let http_budget = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(
            http_budget,
            ConnectionHandle::establish(key, tls, alpn, profile, live),
        )
        .await
        .map_err(|_| RelayError::HandshakeError { host, reason: "http handshake timed out".into() })?
    }

    fn record_timeout(&self, timeout_type: &str) {
        if let Some(m) = &self.metrics {
            m.record_timeout(timeout_type);
        }
    }

    fn record_timeout_if_elapsed(&self, deadline: Instant, timeout_type: &str) {
        if Instant::now() >= deadline {
            self.record_timeout(timeout_type);
        }
    }
}

impl Connect for Negotiator {
    fn connect(
        &self,
        key: &PoolKey,
        profile: &Arc<FingerprintProfile>,
        timeout: Duration,
    ) -> impl Future<Output = Result<ConnectionHandle>> + Send {
        self.negotiate_key(key.clone(), profile, timeout)
    }
}

impl std::fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiator")
            .field("profiles", &self.connectors.len())
            .field("dns_entries", &self.dns.len())
            .finish()
    }
}
