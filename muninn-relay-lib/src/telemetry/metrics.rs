use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const PROFILE: &str = "profile";
    pub const ERROR_TYPE: &str = "error_type";
    pub const STATUS_CODE: &str = "status_code";
    pub const METHOD: &str = "method";
    pub const PROTOCOL: &str = "protocol";
    pub const TIMEOUT_TYPE: &str = "timeout_type";
    pub const REASON: &str = "reason";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const TIMEOUT_CONNECT: &str = "connect";
    pub const TIMEOUT_TLS_HANDSHAKE: &str = "tls_handshake";
    pub const TIMEOUT_RESPONSE: &str = "response";
    pub const EVICT_EXPIRED: &str = "expired";
    pub const EVICT_OVERFLOW: &str = "overflow";
    pub const EVICT_DEAD: &str = "dead";
}

#[derive(Clone)]
pub struct Metrics {
    // Negotiation
    pub handshakes_total: Counter<u64>,
    pub handshake_duration_seconds: Histogram<f64>,
    pub handshake_errors_total: Counter<u64>,
    pub connections_live: UpDownCounter<i64>,

    // Pool
    pub pool_hits_total: Counter<u64>,
    pub pool_misses_total: Counter<u64>,
    pub pool_evictions_total: Counter<u64>,

    // Dispatch
    pub requests_total: Counter<u64>,
    pub request_duration_seconds: Histogram<f64>,
    pub request_retries_total: Counter<u64>,
    pub request_errors_total: Counter<u64>,
    pub timeouts_total: Counter<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            handshakes_total: meter
                .u64_counter("muninn_handshakes_total")
                .with_description("Total number of completed TLS handshakes")
                .build(),
            handshake_duration_seconds: meter
                .f64_histogram("muninn_handshake_duration_seconds")
                .with_description("Connection negotiation duration in seconds (TCP + TLS)")
                .build(),
            handshake_errors_total: meter
                .u64_counter("muninn_handshake_errors_total")
                .with_description("Total number of failed connection negotiations")
                .build(),
            connections_live: meter
                .i64_up_down_counter("muninn_connections_live")
                .with_description("Number of live upstream connections, pooled or in use")
                .build(),

            pool_hits_total: meter
                .u64_counter("muninn_pool_hits_total")
                .with_description("Acquisitions served from an idle pooled connection")
                .build(),
            pool_misses_total: meter
                .u64_counter("muninn_pool_misses_total")
                .with_description("Acquisitions that required a new negotiation")
                .build(),
            pool_evictions_total: meter
                .u64_counter("muninn_pool_evictions_total")
                .with_description("Idle connections closed by the pool")
                .build(),

            requests_total: meter
                .u64_counter("muninn_requests_total")
                .with_description("Total number of relayed requests that got a response")
                .build(),
            request_duration_seconds: meter
                .f64_histogram("muninn_request_duration_seconds")
                .with_description("Relayed request duration in seconds, retries included")
                .build(),
            request_retries_total: meter
                .u64_counter("muninn_request_retries_total")
                .with_description("Total number of second attempts after a transport failure")
                .build(),
            request_errors_total: meter
                .u64_counter("muninn_request_errors_total")
                .with_description("Total number of relayed requests that failed")
                .build(),
            timeouts_total: meter
                .u64_counter("muninn_timeouts_total")
                .with_description("Total number of timeouts by phase")
                .build(),

            build_info: meter
                .u64_gauge("muninn_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_handshake(&self, profile: &str, protocol: &str, duration: f64) {
        let attrs = [
            KeyValue::new(labels::PROFILE, profile.to_string()),
            KeyValue::new(labels::PROTOCOL, protocol.to_string()),
        ];
        self.handshakes_total.add(1, &attrs);
        self.handshake_duration_seconds.record(duration, &attrs);
    }

    pub fn record_handshake_error(&self, profile: &str, error_type: &str) {
        self.handshake_errors_total.add(
            1,
            &[
                KeyValue::new(labels::PROFILE, profile.to_string()),
                KeyValue::new(labels::ERROR_TYPE, error_type.to_string()),
            ],
        );
    }

    pub fn record_pool_hit(&self, profile: &str) {
        self.pool_hits_total
            .add(1, &[KeyValue::new(labels::PROFILE, profile.to_string())]);
    }

    pub fn record_pool_miss(&self, profile: &str) {
        self.pool_misses_total
            .add(1, &[KeyValue::new(labels::PROFILE, profile.to_string())]);
    }

    pub fn record_pool_evictions(&self, count: u64, reason: &str) {
        if count > 0 {
            self.pool_evictions_total
                .add(count, &[KeyValue::new(labels::REASON, reason.to_string())]);
        }
    }

    pub fn record_request(
        &self,
        profile: &str,
        method: &str,
        status_code: u16,
        protocol: &str,
        duration: f64,
    ) {
        let attrs = [
            KeyValue::new(labels::PROFILE, profile.to_string()),
            KeyValue::new(labels::METHOD, method.to_string()),
            KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
            KeyValue::new(labels::PROTOCOL, protocol.to_string()),
        ];
        self.requests_total.add(1, &attrs);
        self.request_duration_seconds.record(duration, &attrs);
    }

    pub fn record_retry(&self, profile: &str, error_type: &str) {
        self.request_retries_total.add(
            1,
            &[
                KeyValue::new(labels::PROFILE, profile.to_string()),
                KeyValue::new(labels::ERROR_TYPE, error_type.to_string()),
            ],
        );
    }

    pub fn record_request_error(&self, profile: &str, error_type: &str) {
        self.request_errors_total.add(
            1,
            &[
                KeyValue::new(labels::PROFILE, profile.to_string()),
                KeyValue::new(labels::ERROR_TYPE, error_type.to_string()),
            ],
        );
    }

    pub fn record_timeout(&self, timeout_type: &str) {
        self.timeouts_total
            .add(1, &[KeyValue::new(labels::TIMEOUT_TYPE, timeout_type.to_string())]);
    }
}

/// Initialize OpenTelemetry metrics with a Prometheus exporter
///
/// Returns the metrics handle and the registry to render with
/// [`render_metrics`](super::render_metrics).
pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("muninn-relay");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
