use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    pub fn code(self) -> u16 {
        match self {
            Self::Tls10 => 0x0301,
            Self::Tls11 => 0x0302,
            Self::Tls12 => 0x0303,
            Self::Tls13 => 0x0304,
        }
    }

    /// Accepts `"1.3"`, `"TLSv1.3"`, `"tls1.3"` and `"0x0304"`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let bare = normalized
            .strip_prefix("tlsv")
            .or_else(|| normalized.strip_prefix("tls"))
            .unwrap_or(&normalized);
        match bare {
            "1.0" | "1" | "0x0301" => Some(Self::Tls10),
            "1.1" | "0x0302" => Some(Self::Tls11),
            "1.2" | "0x0303" => Some(Self::Tls12),
            "1.3" | "0x0304" => Some(Self::Tls13),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SupportedGroup {
    X25519,
    Secp256r1,
    Secp384r1,
    Secp521r1,
}

impl SupportedGroup {
    pub fn code(self) -> u16 {
        match self {
            Self::X25519 => 0x001d,
            Self::Secp256r1 => 0x0017,
            Self::Secp384r1 => 0x0018,
            Self::Secp521r1 => 0x0019,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "x25519" | "0x001d" => Some(Self::X25519),
            "p-256" | "secp256r1" | "0x0017" => Some(Self::Secp256r1),
            "p-384" | "secp384r1" | "0x0018" => Some(Self::Secp384r1),
            "p-521" | "secp521r1" | "0x0019" => Some(Self::Secp521r1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignatureScheme {
    EcdsaSecp256r1Sha256,
    EcdsaSecp384r1Sha384,
    EcdsaSecp521r1Sha512,
    Ed25519,
    RsaPssRsaeSha256,
    RsaPssRsaeSha384,
    RsaPssRsaeSha512,
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
    RsaPkcs1Sha512,
    RsaPkcs1Sha1,
    EcdsaSha1,
}

const SIGNATURE_SCHEMES: &[(&str, SignatureScheme, u16)] = &[
    ("ecdsa_secp256r1_sha256", SignatureScheme::EcdsaSecp256r1Sha256, 0x0403),
    ("ecdsa_secp384r1_sha384", SignatureScheme::EcdsaSecp384r1Sha384, 0x0503),
    ("ecdsa_secp521r1_sha512", SignatureScheme::EcdsaSecp521r1Sha512, 0x0603),
    ("ed25519", SignatureScheme::Ed25519, 0x0807),
    ("rsa_pss_rsae_sha256", SignatureScheme::RsaPssRsaeSha256, 0x0804),
    ("rsa_pss_rsae_sha384", SignatureScheme::RsaPssRsaeSha384, 0x0805),
    ("rsa_pss_rsae_sha512", SignatureScheme::RsaPssRsaeSha512, 0x0806),
    ("rsa_pkcs1_sha256", SignatureScheme::RsaPkcs1Sha256, 0x0401),
    ("rsa_pkcs1_sha384", SignatureScheme::RsaPkcs1Sha384, 0x0501),
    ("rsa_pkcs1_sha512", SignatureScheme::RsaPkcs1Sha512, 0x0601),
    ("rsa_pkcs1_sha1", SignatureScheme::RsaPkcs1Sha1, 0x0201),
    ("ecdsa_sha1", SignatureScheme::EcdsaSha1, 0x0203),
];

impl SignatureScheme {
    pub fn code(self) -> u16 {
        SIGNATURE_SCHEMES
            .iter()
            .find(|(_, scheme, _)| *scheme == self)
            .map(|(_, _, code)| *code)
            .unwrap_or_default()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let by_code = super::registry::parse_code_point(name);
        SIGNATURE_SCHEMES
            .iter()
            .find(|(n, _, code)| n.eq_ignore_ascii_case(name) || Some(*code) == by_code)
            .map(|(_, scheme, _)| *scheme)
    }
}

/// Certificate compression algorithms (RFC 8879)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CertCompression {
    Zlib,
    Brotli,
}

impl CertCompression {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "zlib" => Some(Self::Zlib),
            "brotli" => Some(Self::Brotli),
            _ => None,
        }
    }
}

/// One ClientHello extension with the parameters the connector needs to emit it.
///
/// Extensions without a variant payload are emitted by the TLS stack with fixed
/// contents; their position in the profile still determines wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    ServerName,
    StatusRequest,
    SupportedGroups(Vec<SupportedGroup>),
    EcPointFormats,
    SignatureAlgorithms(Vec<SignatureScheme>),
    Alpn,
    SignedCertificateTimestamp,
    Padding,
    ExtendedMasterSecret,
    CompressCertificate(Vec<CertCompression>),
    RecordSizeLimit(u16),
    DelegatedCredentials(Vec<SignatureScheme>),
    SessionTicket,
    SupportedVersions,
    PskKeyExchangeModes,
    KeyShare,
    EncryptedClientHello,
    RenegotiationInfo,
}

impl Extension {
    pub fn id(&self) -> u16 {
        match self {
            Self::ServerName => 0,
            Self::StatusRequest => 5,
            Self::SupportedGroups(_) => 10,
            Self::EcPointFormats => 11,
            Self::SignatureAlgorithms(_) => 13,
            Self::Alpn => 16,
            Self::SignedCertificateTimestamp => 18,
            Self::Padding => 21,
            Self::ExtendedMasterSecret => 23,
            Self::CompressCertificate(_) => 27,
            Self::RecordSizeLimit(_) => 28,
            Self::DelegatedCredentials(_) => 34,
            Self::SessionTicket => 35,
            Self::SupportedVersions => 43,
            Self::PskKeyExchangeModes => 45,
            Self::KeyShare => 51,
            Self::EncryptedClientHello => 65037,
            Self::RenegotiationInfo => 65281,
        }
    }

    pub fn name(&self) -> &'static str {
        super::registry::extension_name(self.id()).unwrap_or("unknown")
    }
}

/// HTTP/2 SETTINGS and flow-control windows sent on connection start.
/// Unset values keep the HTTP/2 defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Http2Settings {
    #[serde(default)]
    pub header_table_size: Option<u32>,
    #[serde(default)]
    pub enable_push: Option<bool>,
    #[serde(default)]
    pub max_concurrent_streams: Option<u32>,
    #[serde(default)]
    pub initial_stream_window_size: Option<u32>,
    #[serde(default)]
    pub initial_connection_window_size: Option<u32>,
    #[serde(default)]
    pub max_frame_size: Option<u32>,
    #[serde(default)]
    pub max_header_list_size: Option<u32>,
}

/// A validated, immutable browser fingerprint.
///
/// Built only through [`ProfileDefinition`](super::ProfileDefinition), so every
/// instance satisfies the store's validation rules.
#[derive(Debug, Clone)]
pub struct FingerprintProfile {
    pub(super) id: String,
    pub(super) cipher_suites: Vec<u16>,
    pub(super) extensions: Vec<Extension>,
    pub(super) tls_versions: Vec<TlsVersion>,
    pub(super) alpn: Vec<String>,
    pub(super) grease: bool,
    pub(super) http2: Http2Settings,
    pub(super) http1_title_case: bool,
    pub(super) header_order: Vec<HeaderName>,
    pub(super) default_headers: Vec<(HeaderName, HeaderValue)>,
}

impl FingerprintProfile {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cipher_suites(&self) -> &[u16] {
        &self.cipher_suites
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn extension_ids(&self) -> Vec<u16> {
        self.extensions.iter().map(Extension::id).collect()
    }

    pub fn has_extension(&self, id: u16) -> bool {
        self.extensions.iter().any(|e| e.id() == id)
    }

    pub fn tls_versions(&self) -> &[TlsVersion] {
        &self.tls_versions
    }

    pub fn min_version(&self) -> Option<TlsVersion> {
        self.tls_versions.iter().min().copied()
    }

    pub fn max_version(&self) -> Option<TlsVersion> {
        self.tls_versions.iter().max().copied()
    }

    pub fn alpn(&self) -> &[String] {
        &self.alpn
    }

    /// ALPN list in wire format: each protocol prefixed by its length byte.
    pub fn alpn_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.alpn.iter().map(|p| p.len() + 1).sum());
        for proto in &self.alpn {
            // lengths are validated to fit in a byte
            wire.push(u8::try_from(proto.len()).unwrap_or(u8::MAX));
            wire.extend_from_slice(proto.as_bytes());
        }
        wire
    }

    pub fn grease(&self) -> bool {
        self.grease
    }

    pub fn supported_groups(&self) -> &[SupportedGroup] {
        self.extensions
            .iter()
            .find_map(|e| match e {
                Extension::SupportedGroups(groups) => Some(groups.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn signature_algorithms(&self) -> &[SignatureScheme] {
        self.extensions
            .iter()
            .find_map(|e| match e {
                Extension::SignatureAlgorithms(schemes) => Some(schemes.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn http2(&self) -> &Http2Settings {
        &self.http2
    }

    pub fn http1_title_case(&self) -> bool {
        self.http1_title_case
    }

    pub fn header_order(&self) -> &[HeaderName] {
        &self.header_order
    }

    pub fn default_headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.default_headers
    }
}
