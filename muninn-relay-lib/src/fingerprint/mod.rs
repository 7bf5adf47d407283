//! ClientHello wire shapes: what a profile should send and what was captured.

mod capture;
mod client_hello;

pub use capture::{read_client_hello, PrefixedStream};
pub use client_hello::{ClientHelloError, ClientHelloShape, GREASE_PLACEHOLDER};
