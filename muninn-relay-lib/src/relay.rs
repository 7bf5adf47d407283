use http::Method;
use serde::Serialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::dispatch::{Dispatcher, RelayRequest, RelayResponse};
use crate::error::{RelayError, Result};
use crate::negotiator::Negotiator;
use crate::pool::{ConnectionPool, PoolStats};
use crate::profile::ProfileStore;
use crate::telemetry::Metrics;

#[derive(Debug, Clone, Serialize)]
pub struct RelayHealth {
    pub profiles: usize,
    pub default_profile: String,
    pub pool_enabled: bool,
    pub pool: PoolStats,
    pub closed: bool,
}

/// Entry point for a front end: profile store, negotiator, pool and
/// dispatcher wired from one [`Config`].
///
/// Dropping the relay closes every pooled connection and stops the reaper.
#[derive(Debug)]
pub struct Relay {
    store: Arc<ProfileStore>,
    pool: Arc<ConnectionPool>,
    dispatcher: Dispatcher,
    default_profile: String,
    pool_enabled: bool,
    reaper: Option<JoinHandle<()>>,
}

impl Relay {
    /// Build everything `config` describes.
    ///
    /// Fails with `InvalidProfileDefinition` if any profile, built-in or
    /// configured, cannot be loaded. The pool reaper only starts when called
    /// inside a tokio runtime.
    pub fn from_config(config: &Config, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let store = Arc::new(ProfileStore::with_extra(&config.profiles)?);
        store.get_profile(&config.default_profile)?;

        let negotiator = Negotiator::new(&store, config, metrics.clone())?;
        if !negotiator.covers(&store) {
            return Err(RelayError::Config(
                "negotiator was not built from the relay's profile store".to_string(),
            ));
        }
        let pool = Arc::new(ConnectionPool::new(negotiator, &config.pool, metrics.clone()));
        let reaper = match (config.pool.enabled, Handle::try_current()) {
            (true, Ok(_)) => Some(pool.spawn_reaper(config.pool.reap_interval())),
            (true, Err(_)) => {
                debug!("no tokio runtime, idle connections are only expired on acquire");
                None
            }
            (false, _) => None,
        };
        let dispatcher =
            Dispatcher::new(Arc::clone(&store), Arc::clone(&pool), config.timeout.request(), metrics);

        info!(
            profiles = store.len(),
            default_profile = %config.default_profile,
            pool_enabled = config.pool.enabled,
            "relay ready"
        );
        Ok(Self {
            store,
            pool,
            dispatcher,
            default_profile: config.default_profile.clone(),
            pool_enabled: config.pool.enabled,
            reaper,
        })
    }

    pub async fn dispatch(&self, request: RelayRequest) -> Result<RelayResponse> {
        self.dispatcher.dispatch(request).await
    }

    /// A request for `url` using the configured default profile.
    pub fn request(&self, method: Method, url: &str) -> Result<RelayRequest> {
        RelayRequest::new(method, url, self.default_profile.clone())
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.store
    }

    pub fn default_profile(&self) -> &str {
        &self.default_profile
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn health(&self) -> RelayHealth {
        RelayHealth {
            profiles: self.store.len(),
            default_profile: self.default_profile.clone(),
            pool_enabled: self.pool_enabled,
            pool: self.pool.stats(),
            closed: self.pool.is_closed(),
        }
    }

    /// Close pooled connections and stop the reaper. Requests already holding
    /// a connection finish; their connections are not pooled again.
    pub fn shutdown(&mut self) {
        self.pool.close();
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
        info!("relay shut down");
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.pool.close();
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
    }
}
