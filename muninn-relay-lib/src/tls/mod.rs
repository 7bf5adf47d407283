//! Client TLS: one BoringSSL connector per fingerprint profile.

mod compress;
mod connector;

pub use compress::{BrotliCertificateDecompressor, ZlibCertificateDecompressor};
pub use connector::ProfileConnector;
