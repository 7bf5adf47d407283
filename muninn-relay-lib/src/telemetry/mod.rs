pub mod guards;
pub mod metrics;
pub mod tracing;

pub use guards::LiveConnectionGuard;
pub use metrics::{init_metrics, Metrics};
pub use tracing::init_tracing;

use prometheus::{Encoder, TextEncoder};

use crate::error::{RelayError, Result};

/// Render every metric in `registry` in the Prometheus text exposition format
pub fn render_metrics(registry: &prometheus::Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| RelayError::Config(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| RelayError::Config(format!("Metrics output is not UTF-8: {e}")))
}
