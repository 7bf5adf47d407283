pub mod catalog;
mod definition;
pub mod registry;
mod store;
mod types;

pub use definition::{ExtensionDefinition, HeaderDefinition, ProfileDefinition};
pub use store::ProfileStore;
pub use types::{
    CertCompression, Extension, FingerprintProfile, Http2Settings, SignatureScheme,
    SupportedGroup, TlsVersion,
};
