use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::idle::IdleSet;
use super::key::PoolKey;
use crate::config::PoolConfig;
use crate::error::Result;
use crate::negotiator::{Connect, ConnectionHandle, Negotiator};
use crate::net::ProxyRoute;
use crate::profile::FingerprintProfile;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

type SharedIdleSet = Arc<Mutex<IdleSet<ConnectionHandle>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub keys: usize,
    pub idle: usize,
}

/// Reusable upstream connections, keyed by [`PoolKey`].
///
/// Each key has its own idle set behind its own mutex, so different targets
/// never contend. The mutex is only held for in-memory bookkeeping; handles
/// leaving the pool are closed after it is released.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use muninn_relay_lib::{Config, ConnectionPool, Negotiator, ProfileStore};
/// # async fn demo() -> muninn_relay_lib::Result<()> {
/// let config = Config::default();
/// let store = ProfileStore::builtin()?;
/// let negotiator = Negotiator::new(&store, &config, None)?;
/// let pool = Arc::new(ConnectionPool::new(negotiator, &config.pool, None));
///
/// let profile = store.get_profile("chrome-120")?;
/// let handle = pool.acquire("example.com", 443, &profile, None, Duration::from_secs(10)).await?;
/// pool.release(handle);
/// # Ok(())
/// # }
/// ```
pub struct ConnectionPool<C = Negotiator> {
    connector: C,
    idle: DashMap<PoolKey, SharedIdleSet>,
    enabled: bool,
    idle_timeout: Duration,
    max_idle_per_key: usize,
    metrics: Option<Arc<Metrics>>,
    shutdown: CancellationToken,
}

impl<C: Connect> ConnectionPool<C> {
    pub fn new(connector: C, config: &PoolConfig, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            connector,
            idle: DashMap::new(),
            enabled: config.enabled,
            idle_timeout: config.idle_timeout(),
            max_idle_per_key: config.max_idle_per_key,
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// A live idle handle for the target if one is fresh enough, else a new one.
    pub async fn acquire(
        &self,
        host: &str,
        port: u16,
        profile: &Arc<FingerprintProfile>,
        proxy: Option<&ProxyRoute>,
        timeout: Duration,
    ) -> Result<ConnectionHandle> {
        let key = PoolKey::new(host, port, profile.id(), proxy.cloned());
        self.acquire_key(&key, profile, timeout).await
    }

    pub async fn acquire_key(
        &self,
        key: &PoolKey,
        profile: &Arc<FingerprintProfile>,
        timeout: Duration,
    ) -> Result<ConnectionHandle> {
        if let Some(mut handle) = self.take_idle(key) {
            trace!(handle_id = handle.id(), %key, idle_ms = handle.idle_for().as_millis(), "pool hit");
            if let Some(m) = &self.metrics {
                m.record_pool_hit(key.profile());
            }
            handle.touch();
            return Ok(handle);
        }
        if let Some(m) = &self.metrics {
            m.record_pool_miss(key.profile());
        }
        self.negotiate_fresh(key, profile, timeout).await
    }

    /// Always negotiate a new handle, ignoring idle ones.
    pub async fn negotiate_fresh(
        &self,
        key: &PoolKey,
        profile: &Arc<FingerprintProfile>,
        timeout: Duration,
    ) -> Result<ConnectionHandle> {
        self.connector.connect(key, profile, timeout).await
    }

    fn take_idle(&self, key: &PoolKey) -> Option<ConnectionHandle> {
        if !self.enabled {
            return None;
        }
        let set = self.idle.get(key).map(|entry| Arc::clone(entry.value()))?;
        let (handle, discarded) = {
            let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
            guard.pop_fresh(Instant::now(), self.idle_timeout, ConnectionHandle::is_alive)
        };
        if !discarded.is_empty() {
            debug!(%key, closed = discarded.len(), "closed stale idle connections");
            self.record_evictions(discarded.len(), values::EVICT_EXPIRED);
        }
        handle
    }

    /// Return a handle after a successful exchange.
    ///
    /// Dead handles are dropped. If the key's idle set grows past
    /// `max_idle_per_key`, the least recently released handles are closed.
    pub fn release(&self, mut handle: ConnectionHandle) {
        if !self.enabled || self.shutdown.is_cancelled() {
            return;
        }
        if !handle.is_alive() {
            trace!(handle_id = handle.id(), "dropping dead connection on release");
            self.record_evictions(1, values::EVICT_DEAD);
            return;
        }
        handle.touch();
        let key = handle.key().clone();
        // push under the map entry so evict_expired cannot drop the set in between
        let evicted = {
            let entry = self.idle.entry(key.clone()).or_default();
            let mut guard = entry.value().lock().unwrap_or_else(PoisonError::into_inner);
            guard.push(handle, Instant::now(), self.max_idle_per_key)
        };
        if !evicted.is_empty() {
            debug!(%key, closed = evicted.len(), "idle set full, closed least recently used");
            self.record_evictions(evicted.len(), values::EVICT_OVERFLOW);
        }
    }

    /// Close idle handles past the idle timeout on every key; returns how many.
    ///
    /// Keys left without idle handles are forgotten.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let sets: Vec<(PoolKey, SharedIdleSet)> =
            self.idle.iter().map(|e| (e.key().clone(), Arc::clone(e.value()))).collect();
        let mut closed = 0usize;
        for (key, set) in sets {
            let expired = {
                let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
                guard.drain_expired(now, self.idle_timeout)
            };
            closed = closed.saturating_add(expired.len());
            self.idle.remove_if(&key, |_, set| {
                set.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
            });
        }
        if closed > 0 {
            debug!(closed, "evicted expired idle connections");
            self.record_evictions(closed, values::EVICT_EXPIRED);
        }
        closed
    }

    pub fn idle_count(&self, key: &PoolKey) -> usize {
        self.idle
            .get(key)
            .map(|set| set.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Keys currently tracked, including ones whose idle set has been drained
    /// but not yet swept by [`evict_expired`](Self::evict_expired).
    pub fn tracked_keys(&self) -> usize {
        self.idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for entry in self.idle.iter() {
            let len = entry.value().lock().unwrap_or_else(PoisonError::into_inner).len();
            if len > 0 {
                stats.keys = stats.keys.saturating_add(1);
                stats.idle = stats.idle.saturating_add(len);
            }
        }
        stats
    }

    /// Close every idle handle.
    pub fn clear(&self) {
        let sets: Vec<SharedIdleSet> = self.idle.iter().map(|e| Arc::clone(e.value())).collect();
        self.idle.clear();
        for set in sets {
            let drained = set.lock().unwrap_or_else(PoisonError::into_inner).drain_all();
            drop(drained);
        }
    }

    /// Stop accepting released handles, stop the reaper, close idle handles.
    pub fn close(&self) {
        self.shutdown.cancel();
        self.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn record_evictions(&self, count: usize, reason: &str) {
        if let Some(m) = &self.metrics {
            m.record_pool_evictions(u64::try_from(count).unwrap_or(u64::MAX), reason);
        }
    }
}

impl<C: Connect> ConnectionPool<C> {
    /// Run [`evict_expired`](Self::evict_expired) every `interval` until the
    /// pool is closed or dropped.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let pool: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        pool.evict_expired();
                    }
                }
            }
            trace!("pool reaper stopped");
        })
    }
}

impl<C> Drop for ConnectionPool<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<C> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("keys", &self.idle.len())
            .field("enabled", &self.enabled)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_idle_per_key", &self.max_idle_per_key)
            .finish()
    }
}
