mod loader;
mod types;

pub use loader::{load_from_path, load_from_str, validate_config};
pub use types::{
    Config, DnsConfig, LoggingConfig, PoolConfig, TelemetryConfig, TimeoutConfig,
    TlsVerifyConfig,
};
