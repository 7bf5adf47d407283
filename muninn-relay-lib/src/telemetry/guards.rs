use opentelemetry::metrics::UpDownCounter;

/// Keeps the live-connection gauge in step with a connection handle.
///
/// Increments on creation and decrements when dropped, so a handle that is
/// closed through any path (eviction, failure, shutdown) is accounted for.
pub struct LiveConnectionGuard {
    connections_live: Option<UpDownCounter<i64>>,
}

impl LiveConnectionGuard {
    pub fn new(connections_live: Option<UpDownCounter<i64>>) -> Self {
        if let Some(ref counter) = connections_live {
            counter.add(1, &[]);
        }
        Self { connections_live }
    }
}

impl Drop for LiveConnectionGuard {
    fn drop(&mut self) {
        if let Some(ref counter) = self.connections_live {
            counter.add(-1, &[]);
        }
    }
}

impl std::fmt::Debug for LiveConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnectionGuard")
            .field("tracked", &self.connections_live.is_some())
            .finish()
    }
}
