#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod negotiator;
pub mod net;
pub mod pool;
pub mod profile;
pub mod relay;
pub mod telemetry;
pub mod tls;

pub use config::{load_from_path, load_from_str, Config};
pub use dispatch::{Dispatcher, RelayRequest, RelayResponse};
pub use error::{RelayError, Result};
pub use fingerprint::{read_client_hello, ClientHelloShape, PrefixedStream};
pub use negotiator::{Connect, ConnectionHandle, Negotiator};
pub use net::ProxyRoute;
pub use pool::{ConnectionPool, PoolKey, PoolStats};
pub use profile::{FingerprintProfile, ProfileDefinition, ProfileStore};
pub use relay::{Relay, RelayHealth};
