use rama_boring::ssl::{
    ConnectConfiguration, SslConnector, SslCurve, SslMethod, SslOptions, SslSignatureAlgorithm,
    SslVerifyMode, SslVersion,
};
use rama_boring::x509::{X509VerifyResult, X509};
use rama_boring_tokio::{HandshakeError, SslStream};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use super::compress::{BrotliCertificateDecompressor, ZlibCertificateDecompressor};
use crate::config::TlsVerifyConfig;
use crate::error::{RelayError, Result};
use crate::fingerprint::ClientHelloShape;
use crate::profile::{
    CertCompression, Extension, FingerprintProfile, SignatureScheme, SupportedGroup, TlsVersion,
};

fn ssl_version(v: TlsVersion) -> SslVersion {
    match v {
        TlsVersion::Tls10 => SslVersion::TLS1,
        TlsVersion::Tls11 => SslVersion::TLS1_1,
        TlsVersion::Tls12 => SslVersion::TLS1_2,
        TlsVersion::Tls13 => SslVersion::TLS1_3,
    }
}

fn ssl_curve(g: SupportedGroup) -> SslCurve {
    match g {
        SupportedGroup::X25519 => SslCurve::X25519,
        SupportedGroup::Secp256r1 => SslCurve::SECP256R1,
        SupportedGroup::Secp384r1 => SslCurve::SECP384R1,
        SupportedGroup::Secp521r1 => SslCurve::SECP521R1,
    }
}

fn ssl_sigalg(s: SignatureScheme) -> SslSignatureAlgorithm {
    match s {
        SignatureScheme::EcdsaSecp256r1Sha256 => SslSignatureAlgorithm::ECDSA_SECP256R1_SHA256,
        SignatureScheme::EcdsaSecp384r1Sha384 => SslSignatureAlgorithm::ECDSA_SECP384R1_SHA384,
        SignatureScheme::EcdsaSecp521r1Sha512 => SslSignatureAlgorithm::ECDSA_SECP521R1_SHA512,
        SignatureScheme::Ed25519 => SslSignatureAlgorithm::ED25519,
        SignatureScheme::RsaPssRsaeSha256 => SslSignatureAlgorithm::RSA_PSS_RSAE_SHA256,
        SignatureScheme::RsaPssRsaeSha384 => SslSignatureAlgorithm::RSA_PSS_RSAE_SHA384,
        SignatureScheme::RsaPssRsaeSha512 => SslSignatureAlgorithm::RSA_PSS_RSAE_SHA512,
        SignatureScheme::RsaPkcs1Sha256 => SslSignatureAlgorithm::RSA_PKCS1_SHA256,
        SignatureScheme::RsaPkcs1Sha384 => SslSignatureAlgorithm::RSA_PKCS1_SHA384,
        SignatureScheme::RsaPkcs1Sha512 => SslSignatureAlgorithm::RSA_PKCS1_SHA512,
        SignatureScheme::RsaPkcs1Sha1 => SslSignatureAlgorithm::RSA_PKCS1_SHA1,
        SignatureScheme::EcdsaSha1 => SslSignatureAlgorithm::ECDSA_SHA1,
    }
}

/// A BoringSSL connector that reproduces one profile's ClientHello.
///
/// Built once per profile at startup; every handshake takes a fresh
/// [`ConnectConfiguration`] from it so no session state leaks between
/// connections.
pub struct ProfileConnector {
    profile: Arc<FingerprintProfile>,
    connector: SslConnector,
    verify: bool,
    record_size_limit: Option<u16>,
    delegated_credentials: Option<Vec<SslSignatureAlgorithm>>,
    ech_grease: bool,
}

impl ProfileConnector {
    pub fn new(profile: Arc<FingerprintProfile>, tls: &TlsVerifyConfig) -> Result<Self> {
        let id = profile.id().to_string();
        let boring = |step: &str, e: rama_boring::error::ErrorStack| {
            RelayError::invalid_profile(&id, format!("{step}: {e}"))
        };

        let mut builder =
            SslConnector::builder(SslMethod::tls_client()).map_err(|e| boring("create connector", e))?;

        let order = profile.extension_ids();
        trace!(profile = %id, ?order, "set extension order");
        builder
            .set_extension_order(&order)
            .map_err(|e| boring("set extension order", e))?;
        builder
            .set_raw_cipher_list(profile.cipher_suites())
            .map_err(|e| boring("set cipher list", e))?;
        builder
            .set_alpn_protos(&profile.alpn_wire())
            .map_err(|e| boring("set alpn protos", e))?;

        let curves: Vec<SslCurve> = profile.supported_groups().iter().map(|g| ssl_curve(*g)).collect();
        if !curves.is_empty() {
            builder.set_curves(&curves).map_err(|e| boring("set curves", e))?;
        }

        builder
            .set_min_proto_version(profile.min_version().map(ssl_version))
            .map_err(|e| boring("set min proto version", e))?;
        builder
            .set_max_proto_version(profile.max_version().map(ssl_version))
            .map_err(|e| boring("set max proto version", e))?;

        let sigalgs: Vec<SslSignatureAlgorithm> =
            profile.signature_algorithms().iter().map(|s| ssl_sigalg(*s)).collect();
        if !sigalgs.is_empty() {
            builder
                .set_verify_algorithm_prefs(&sigalgs)
                .map_err(|e| boring("set signature algorithms", e))?;
        }

        builder.set_grease_enabled(profile.grease());

        let mut record_size_limit = None;
        let mut delegated_credentials = None;
        let mut ech_grease = false;
        for ext in profile.extensions() {
            match ext {
                Extension::StatusRequest => builder.enable_ocsp_stapling(),
                Extension::SignedCertificateTimestamp => builder.enable_signed_cert_timestamps(),
                Extension::CompressCertificate(algorithms) => {
                    for algorithm in algorithms {
                        match algorithm {
                            CertCompression::Brotli => builder
                                .add_certificate_compression_algorithm(BrotliCertificateDecompressor),
                            CertCompression::Zlib => builder
                                .add_certificate_compression_algorithm(ZlibCertificateDecompressor),
                        }
                        .map_err(|e| boring("add certificate compression", e))?;
                    }
                }
                Extension::RecordSizeLimit(limit) => record_size_limit = Some(*limit),
                Extension::DelegatedCredentials(schemes) => {
                    delegated_credentials = Some(schemes.iter().map(|s| ssl_sigalg(*s)).collect())
                }
                Extension::EncryptedClientHello => ech_grease = true,
                _ => {}
            }
        }
        if !profile.has_extension(35) {
            builder.set_options(SslOptions::NO_TICKET);
        }

        if tls.verify {
            if let Some(ca_file) = &tls.ca_file {
                let pem = std::fs::read(ca_file).map_err(|e| {
                    RelayError::Config(format!("Failed to read CA file {}: {e}", ca_file.display()))
                })?;
                let certs = X509::stack_from_pem(&pem).map_err(|e| {
                    RelayError::Config(format!("Failed to parse CA file {}: {e}", ca_file.display()))
                })?;
                for cert in certs {
                    builder
                        .cert_store_mut()
                        .add_cert(cert)
                        .map_err(|e| RelayError::Config(format!("Failed to add CA cert: {e}")))?;
                }
            }
        } else {
            builder.set_custom_verify_callback(SslVerifyMode::NONE, |_| Ok(()));
        }

        debug!(
            profile = %id,
            ja3 = %ClientHelloShape::expected(&profile, None).ja3_string(),
            verify = tls.verify,
            "tls connector ready"
        );

        Ok(Self {
            profile,
            connector: builder.build(),
            verify: tls.verify,
            record_size_limit,
            delegated_credentials,
            ech_grease,
        })
    }

    pub fn profile(&self) -> &Arc<FingerprintProfile> {
        &self.profile
    }

    fn configure(&self) -> std::result::Result<ConnectConfiguration, rama_boring::error::ErrorStack> {
        let mut cfg = self.connector.configure()?;
        if let Some(limit) = self.record_size_limit {
            cfg.set_record_size_limit(limit)?;
        }
        if let Some(schemes) = &self.delegated_credentials {
            cfg.set_delegated_credential_schemes(schemes)?;
        }
        if self.ech_grease {
            cfg.set_enable_ech_grease(true);
        }
        if !self.verify {
            cfg.set_verify_hostname(false);
        }
        Ok(cfg)
    }

    /// Run the client handshake for `host` over `stream`.
    ///
    /// Certificate failures, protocol mismatches and resets all surface as
    /// [`RelayError::HandshakeError`].
    pub async fn handshake<S>(&self, host: &str, stream: S) -> Result<SslStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let handshake_error =
            |reason: String| RelayError::HandshakeError { host: host.to_string(), reason };
        let cfg = self
            .configure()
            .map_err(|e| handshake_error(format!("connection setup: {e}")))?;
        rama_boring_tokio::connect(cfg, host, stream)
            .await
            .map_err(|e| handshake_error(describe_handshake_error(&e)))
    }
}

fn describe_handshake_error<S>(err: &HandshakeError<S>) -> String {
    if let Some(ssl) = err.ssl() {
        let verify = ssl.verify_result();
        if verify != X509VerifyResult::OK {
            return format!("certificate verification failed: {}", verify.error_string());
        }
    }
    match err.as_io_error() {
        Some(io) => io.to_string(),
        None => "handshake rejected by peer".to_string(),
    }
}

impl std::fmt::Debug for ProfileConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileConnector")
            .field("profile", &self.profile.id())
            .field("verify", &self.verify)
            .finish()
    }
}
