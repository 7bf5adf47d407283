//! Everything below TLS: name resolution, sockets, proxy tunnels.

pub mod dns;
pub mod proxy;
pub mod stream;
pub mod tcp;

pub use dns::DnsCache;
pub use proxy::ProxyRoute;
pub use stream::{boxed, BoxedStream, RawStream};
pub use tcp::connect_any;
