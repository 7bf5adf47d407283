//! Relays requests over pooled fingerprinted connections.

mod decode;
mod dispatcher;
pub mod headers;
mod request;
mod response;

pub use decode::decode_body;
pub use dispatcher::Dispatcher;
pub use request::RelayRequest;
pub use response::RelayResponse;
