use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::profile::{catalog, ProfileDefinition};

/// Root configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Profile used when a request does not name one
    /// Default: "chrome-120"
    #[serde(default = "default_profile")]
    pub default_profile: String,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub tls: TlsVerifyConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Extra fingerprint profiles, validated like the built-in catalog
    #[serde(default)]
    pub profiles: Vec<ProfileDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: default_profile(),
            pool: PoolConfig::default(),
            timeout: TimeoutConfig::default(),
            tls: TlsVerifyConfig::default(),
            dns: DnsConfig::default(),
            logging: LoggingConfig::default(),
            telemetry: TelemetryConfig::default(),
            profiles: Vec::new(),
        }
    }
}

/// Connection pool configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    /// Keep idle connections for reuse
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Idle connections older than this are closed instead of reused
    /// Default: 90000 (90 seconds)
    #[serde(default = "default_pool_idle_timeout")]
    pub idle_timeout_ms: u64,
    /// Maximum idle connections kept per (host, port, profile, proxy) key
    /// Default: 8
    #[serde(default = "default_max_idle_per_key")]
    pub max_idle_per_key: usize,
    /// How often the background reaper closes expired idle connections
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout_ms: default_pool_idle_timeout(),
            max_idle_per_key: default_max_idle_per_key(),
            reap_interval_ms: default_reap_interval(),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// TCP connect timeout in milliseconds, per attempt (proxy CONNECT included)
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
    /// TLS handshake timeout in milliseconds
    /// Default: 10000 (10 seconds)
    #[serde(default = "default_tls_handshake_timeout")]
    pub tls_handshake_ms: u64,
    /// Whole-request timeout in milliseconds, used when a request sets none
    /// Covers negotiation, sending, and reading the full response body
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn tls_handshake(&self) -> Duration {
        Duration::from_millis(self.tls_handshake_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            tls_handshake_ms: default_tls_handshake_timeout(),
            request_ms: default_request_timeout(),
        }
    }
}

/// Upstream certificate verification
#[derive(Debug, Deserialize, Clone)]
pub struct TlsVerifyConfig {
    /// Verify the upstream certificate chain and hostname
    /// Default: true
    #[serde(default = "default_true")]
    pub verify: bool,
    /// Extra PEM bundle of trusted roots, added to the system store
    /// Default: None
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl Default for TlsVerifyConfig {
    fn default() -> Self {
        Self { verify: true, ca_file: None }
    }
}

/// DNS cache configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DnsConfig {
    /// Default: 30
    #[serde(default = "default_dns_min_ttl")]
    pub min_ttl_secs: u64,
    /// Default: 3600
    #[serde(default = "default_dns_max_ttl")]
    pub max_ttl_secs: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self { min_ttl_secs: default_dns_min_ttl(), max_ttl_secs: default_dns_max_ttl() }
    }
}

/// Logging configuration
/// Controls application-level structured logging (stderr)
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Can be overridden at runtime via RUST_LOG environment variable
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Record OpenTelemetry metrics into a Prometheus registry
    /// Default: false
    #[serde(default)]
    pub metrics_enabled: bool,
    /// OpenTelemetry internal log level
    /// Controls verbosity of OpenTelemetry SDK internal logs (not application logs)
    /// Default: "warn"
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { metrics_enabled: false, otel_log_level: default_otel_log_level() }
    }
}

fn default_profile() -> String {
    catalog::CHROME_120.to_string()
}

fn default_true() -> bool {
    true
}

fn default_pool_idle_timeout() -> u64 {
    90_000
}

fn default_max_idle_per_key() -> usize {
    8
}

fn default_reap_interval() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_tls_handshake_timeout() -> u64 {
    10_000
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_dns_min_ttl() -> u64 {
    30
}

fn default_dns_max_ttl() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}
