use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::registry;
use super::types::{
    CertCompression, Extension, FingerprintProfile, Http2Settings, SignatureScheme,
    SupportedGroup, TlsVersion,
};
use crate::error::{RelayError, Result};

/// Declarative form of a profile, as written in the catalog or a `[[profiles]]`
/// config table. Turned into a [`FingerprintProfile`] by [`ProfileDefinition::build`].
///
/// # Example
///
/// ```toml
/// [[profiles]]
/// id = "minimal"
/// cipher_suites = ["TLS_AES_128_GCM_SHA256", "0xc02f"]
/// alpn = ["http/1.1"]
/// extensions = [
///     { name = "server_name" },
///     { name = "supported_groups", groups = ["X25519", "P-256"] },
///     { name = "signature_algorithms", algorithms = ["rsa_pss_rsae_sha256"] },
///     { name = "alpn" },
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub id: String,
    pub cipher_suites: Vec<String>,
    pub extensions: Vec<ExtensionDefinition>,
    /// Default: ["1.3", "1.2"]
    #[serde(default = "default_tls_versions")]
    pub tls_versions: Vec<String>,
    pub alpn: Vec<String>,
    /// Insert GREASE values into ciphers, extensions and groups
    /// Default: false
    #[serde(default)]
    pub grease: bool,
    #[serde(default)]
    pub http2: Http2Settings,
    /// Send HTTP/1.1 header names in Title-Case
    /// Default: false
    #[serde(default)]
    pub http1_title_case: bool,
    /// Header names in the order they should appear on the wire
    #[serde(default)]
    pub header_order: Vec<String>,
    /// Headers added to every request unless the caller sets them
    #[serde(default)]
    pub default_headers: Vec<HeaderDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDefinition {
    pub name: String,
    /// Named groups for `supported_groups`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Signature schemes for `signature_algorithms` / `delegated_credentials`,
    /// algorithms for `compress_certificate`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub algorithms: Vec<String>,
    /// Limit for `record_size_limit`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u16>,
}

impl ExtensionDefinition {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), groups: Vec::new(), algorithms: Vec::new(), limit: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderDefinition {
    pub name: String,
    pub value: String,
}

fn default_tls_versions() -> Vec<String> {
    vec!["1.3".to_string(), "1.2".to_string()]
}

impl ProfileDefinition {
    /// Validate the definition and build the immutable profile.
    ///
    /// Fails with [`RelayError::InvalidProfileDefinition`] on an unknown cipher
    /// suite, extension, version, group or signature algorithm, on an empty
    /// cipher or ALPN list, on a repeated extension, and on a parameterised
    /// extension given without its parameters.
    pub fn build(&self) -> Result<FingerprintProfile> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(RelayError::invalid_profile(&self.id, "profile id is empty"));
        }
        let invalid = |reason: String| RelayError::invalid_profile(id, reason);

        if self.cipher_suites.is_empty() {
            return Err(invalid("cipher suite list is empty".to_string()));
        }
        let cipher_suites = self
            .cipher_suites
            .iter()
            .map(|name| {
                registry::resolve_cipher_suite(name)
                    .ok_or_else(|| invalid(format!("unknown cipher suite '{name}'")))
            })
            .collect::<Result<Vec<u16>>>()?;

        let mut seen = HashSet::new();
        let mut extensions = Vec::with_capacity(self.extensions.len());
        for def in &self.extensions {
            let ext = build_extension(def).map_err(invalid)?;
            if !seen.insert(ext.id()) {
                return Err(invalid(format!("extension '{}' listed twice", ext.name())));
            }
            extensions.push(ext);
        }

        let tls_versions = self
            .tls_versions
            .iter()
            .map(|v| {
                TlsVersion::from_name(v).ok_or_else(|| invalid(format!("unknown TLS version '{v}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        if tls_versions.is_empty() {
            return Err(invalid("TLS version list is empty".to_string()));
        }

        if self.alpn.is_empty() {
            return Err(invalid("ALPN list is empty".to_string()));
        }
        for proto in &self.alpn {
            if proto.is_empty() || proto.len() > usize::from(u8::MAX) {
                return Err(invalid(format!("ALPN protocol '{proto}' has invalid length")));
            }
        }

        let header_order = self
            .header_order
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.trim().to_ascii_lowercase().as_bytes())
                    .map_err(|_| invalid(format!("invalid header name '{name}'")))
            })
            .collect::<Result<Vec<_>>>()?;

        let default_headers = self
            .default_headers
            .iter()
            .map(|h| {
                let name = HeaderName::from_bytes(h.name.trim().to_ascii_lowercase().as_bytes())
                    .map_err(|_| invalid(format!("invalid header name '{}'", h.name)))?;
                let value = HeaderValue::from_str(&h.value)
                    .map_err(|_| invalid(format!("invalid value for header '{}'", h.name)))?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FingerprintProfile {
            id: id.to_string(),
            cipher_suites,
            extensions,
            tls_versions,
            alpn: self.alpn.clone(),
            grease: self.grease,
            http2: self.http2.clone(),
            http1_title_case: self.http1_title_case,
            header_order,
            default_headers,
        })
    }
}

fn build_extension(def: &ExtensionDefinition) -> std::result::Result<Extension, String> {
    let code = registry::resolve_extension(&def.name)
        .ok_or_else(|| format!("unknown extension '{}'", def.name))?;

    let ext = match code {
        0 => Extension::ServerName,
        5 => Extension::StatusRequest,
        10 => Extension::SupportedGroups(parse_list(&def.groups, "supported_groups", |g| {
            SupportedGroup::from_name(g).ok_or_else(|| format!("unknown group '{g}'"))
        })?),
        11 => Extension::EcPointFormats,
        13 => Extension::SignatureAlgorithms(parse_list(
            &def.algorithms,
            "signature_algorithms",
            parse_scheme,
        )?),
        16 => Extension::Alpn,
        18 => Extension::SignedCertificateTimestamp,
        21 => Extension::Padding,
        23 => Extension::ExtendedMasterSecret,
        27 => Extension::CompressCertificate(parse_list(
            &def.algorithms,
            "compress_certificate",
            |a| {
                CertCompression::from_name(a)
                    .ok_or_else(|| format!("unknown certificate compression '{a}'"))
            },
        )?),
        28 => Extension::RecordSizeLimit(
            def.limit
                .ok_or_else(|| "record_size_limit requires a limit".to_string())?,
        ),
        34 => Extension::DelegatedCredentials(parse_list(
            &def.algorithms,
            "delegated_credentials",
            parse_scheme,
        )?),
        35 => Extension::SessionTicket,
        43 => Extension::SupportedVersions,
        45 => Extension::PskKeyExchangeModes,
        51 => Extension::KeyShare,
        65037 => Extension::EncryptedClientHello,
        65281 => Extension::RenegotiationInfo,
        other => return Err(format!("extension {other:#06x} cannot be emitted")),
    };
    Ok(ext)
}

fn parse_scheme(name: &str) -> std::result::Result<SignatureScheme, String> {
    SignatureScheme::from_name(name).ok_or_else(|| format!("unknown signature algorithm '{name}'"))
}

fn parse_list<T, F>(
    values: &[String],
    extension: &str,
    parse: F,
) -> std::result::Result<Vec<T>, String>
where
    F: Fn(&str) -> std::result::Result<T, String>,
{
    if values.is_empty() {
        return Err(format!("{extension} requires parameters"));
    }
    values.iter().map(|v| parse(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ProfileDefinition {
        ProfileDefinition {
            id: "minimal".to_string(),
            cipher_suites: vec!["TLS_AES_128_GCM_SHA256".to_string(), "0xc02f".to_string()],
            extensions: vec![
                ExtensionDefinition::named("server_name"),
                ExtensionDefinition {
                    groups: vec!["X25519".to_string(), "P-256".to_string()],
                    ..ExtensionDefinition::named("supported_groups")
                },
                ExtensionDefinition {
                    algorithms: vec!["rsa_pss_rsae_sha256".to_string(), "0x0403".to_string()],
                    ..ExtensionDefinition::named("signature_algorithms")
                },
                ExtensionDefinition::named("alpn"),
            ],
            tls_versions: default_tls_versions(),
            alpn: vec!["h2".to_string(), "http/1.1".to_string()],
            grease: false,
            http2: Http2Settings::default(),
            http1_title_case: false,
            header_order: vec!["User-Agent".to_string(), "accept".to_string()],
            default_headers: vec![HeaderDefinition {
                name: "User-Agent".to_string(),
                value: "muninn".to_string(),
            }],
        }
    }

    fn reason_of(def: &ProfileDefinition) -> String {
        match def.build() {
            Err(RelayError::InvalidProfileDefinition { reason, .. }) => reason,
            other => panic!("expected InvalidProfileDefinition, got {other:?}"),
        }
    }

    #[test]
    fn builds_valid_definition() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let profile = minimal().build()?;
        assert_eq!(profile.cipher_suites(), &[0x1301, 0xc02f]);
        assert_eq!(profile.extension_ids(), vec![0, 10, 13, 16]);
        assert_eq!(profile.supported_groups(), &[SupportedGroup::X25519, SupportedGroup::Secp256r1]);
        assert_eq!(
            profile.signature_algorithms(),
            &[SignatureScheme::RsaPssRsaeSha256, SignatureScheme::EcdsaSecp256r1Sha256]
        );
        assert_eq!(profile.min_version(), Some(TlsVersion::Tls12));
        assert_eq!(profile.max_version(), Some(TlsVersion::Tls13));
        assert_eq!(profile.alpn_wire(), b"\x02h2\x08http/1.1".to_vec());
        assert_eq!(profile.header_order()[0].as_str(), "user-agent");
        Ok(())
    }

    #[test]
    fn rejects_unknown_cipher_suite() {
        let mut def = minimal();
        def.cipher_suites.push("TLS_NOT_A_SUITE".to_string());
        assert!(reason_of(&def).contains("TLS_NOT_A_SUITE"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let mut def = minimal();
        def.extensions.push(ExtensionDefinition::named("0x9999"));
        assert!(reason_of(&def).contains("unknown extension"));
    }

    #[test]
    fn rejects_empty_alpn() {
        let mut def = minimal();
        def.alpn.clear();
        assert!(reason_of(&def).contains("ALPN"));
    }

    #[test]
    fn rejects_empty_cipher_list() {
        let mut def = minimal();
        def.cipher_suites.clear();
        assert!(reason_of(&def).contains("cipher suite list is empty"));
    }

    #[test]
    fn rejects_duplicate_extension() {
        let mut def = minimal();
        def.extensions.push(ExtensionDefinition::named("sni"));
        assert!(reason_of(&def).contains("listed twice"));
    }

    #[test]
    fn rejects_parameterised_extension_without_parameters() {
        let mut def = minimal();
        def.extensions.push(ExtensionDefinition::named("compress_certificate"));
        assert!(reason_of(&def).contains("requires parameters"));

        let mut def = minimal();
        def.extensions.push(ExtensionDefinition::named("record_size_limit"));
        assert!(reason_of(&def).contains("requires a limit"));
    }

    #[test]
    fn rejects_unknown_group_and_version() {
        let mut def = minimal();
        def.extensions[1].groups.push("ffdhe2048".to_string());
        assert!(reason_of(&def).contains("ffdhe2048"));

        let mut def = minimal();
        def.tls_versions = vec!["1.4".to_string()];
        assert!(reason_of(&def).contains("TLS version"));
    }

    #[test]
    fn parses_from_toml() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let def: ProfileDefinition = toml::from_str(
            r#"
            id = "toml-profile"
            cipher_suites = ["0x1301"]
            alpn = ["http/1.1"]
            extensions = [
                { name = "server_name" },
                { name = "record_size_limit", limit = 16385 },
            ]
            "#,
        )?;
        let profile = def.build()?;
        assert_eq!(profile.tls_versions(), &[TlsVersion::Tls13, TlsVersion::Tls12]);
        assert_eq!(profile.extensions()[1], Extension::RecordSizeLimit(16385));
        Ok(())
    }
}
