//! Name ↔ code point tables for everything a profile definition may reference.
//!
//! Only identifiers the BoringSSL handshake can actually put on the wire are
//! listed, so a profile that validates here is one the connector can reproduce.

/// Cipher suites the connector can offer, by IANA name.
const CIPHER_SUITES: &[(&str, u16)] = &[
    // TLS 1.3
    ("TLS_AES_128_GCM_SHA256", 0x1301),
    ("TLS_AES_256_GCM_SHA384", 0x1302),
    ("TLS_CHACHA20_POLY1305_SHA256", 0x1303),
    // TLS 1.2: ECDHE AEAD
    ("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", 0xc02b),
    ("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", 0xc02f),
    ("TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", 0xc02c),
    ("TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", 0xc030),
    ("TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", 0xcca9),
    ("TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", 0xcca8),
    // TLS 1.2: ECDHE CBC
    ("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", 0xc009),
    ("TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", 0xc00a),
    ("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", 0xc013),
    ("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", 0xc014),
    ("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", 0xc027),
    // TLS 1.2: static RSA
    ("TLS_RSA_WITH_AES_128_GCM_SHA256", 0x009c),
    ("TLS_RSA_WITH_AES_256_GCM_SHA384", 0x009d),
    ("TLS_RSA_WITH_AES_128_CBC_SHA", 0x002f),
    ("TLS_RSA_WITH_AES_256_CBC_SHA", 0x0035),
    ("TLS_RSA_WITH_3DES_EDE_CBC_SHA", 0x000a),
];

/// Extensions by registry name, in code point order.
const EXTENSIONS: &[(&str, u16)] = &[
    ("server_name", 0),
    ("status_request", 5),
    ("supported_groups", 10),
    ("ec_point_formats", 11),
    ("signature_algorithms", 13),
    ("application_layer_protocol_negotiation", 16),
    ("signed_certificate_timestamp", 18),
    ("padding", 21),
    ("extended_master_secret", 23),
    ("compress_certificate", 27),
    ("record_size_limit", 28),
    ("delegated_credentials", 34),
    ("session_ticket", 35),
    ("supported_versions", 43),
    ("psk_key_exchange_modes", 45),
    ("key_share", 51),
    ("encrypted_client_hello", 65037),
    ("renegotiation_info", 65281),
];

/// Short aliases accepted in definitions besides the registry names.
const EXTENSION_ALIASES: &[(&str, u16)] = &[("alpn", 16), ("sni", 0), ("ech", 65037)];

pub fn supported_cipher_suites() -> Vec<&'static str> {
    CIPHER_SUITES.iter().map(|(name, _)| *name).collect()
}

pub fn supported_extensions() -> Vec<&'static str> {
    EXTENSIONS.iter().map(|(name, _)| *name).collect()
}

pub fn is_cipher_suite_supported(code: u16) -> bool {
    CIPHER_SUITES.iter().any(|(_, c)| *c == code)
}

pub fn is_extension_supported(code: u16) -> bool {
    EXTENSIONS.iter().any(|(_, c)| *c == code)
}

pub fn cipher_suite_name(code: u16) -> Option<&'static str> {
    CIPHER_SUITES.iter().find(|(_, c)| *c == code).map(|(name, _)| *name)
}

pub fn extension_name(code: u16) -> Option<&'static str> {
    EXTENSIONS.iter().find(|(_, c)| *c == code).map(|(name, _)| *name)
}

/// Resolve a cipher suite given as an IANA name or a hex code point (`0x1301`).
///
/// Returns `None` for anything the connector cannot offer.
pub fn resolve_cipher_suite(value: &str) -> Option<u16> {
    let value = value.trim();
    let code = match parse_code_point(value) {
        Some(code) => code,
        None => CIPHER_SUITES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, code)| *code)?,
    };
    is_cipher_suite_supported(code).then_some(code)
}

/// Resolve an extension given by name, alias, or hex code point.
pub fn resolve_extension(value: &str) -> Option<u16> {
    let value = value.trim();
    let code = match parse_code_point(value) {
        Some(code) => code,
        None => EXTENSIONS
            .iter()
            .chain(EXTENSION_ALIASES)
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
            .map(|(_, code)| *code)?,
    };
    is_extension_supported(code).then_some(code)
}

/// Parse `0x`-prefixed hex into a 16-bit code point.
pub fn parse_code_point(value: &str) -> Option<u16> {
    let hex = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    u16::from_str_radix(hex, 16).ok()
}

/// GREASE values (RFC 8701) follow the `0x?a?a` pattern with equal bytes.
pub fn is_grease(code: u16) -> bool {
    let [hi, lo] = code.to_be_bytes();
    hi == lo && (lo & 0x0f) == 0x0a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_and_hex() {
        assert_eq!(resolve_cipher_suite("TLS_AES_128_GCM_SHA256"), Some(0x1301));
        assert_eq!(resolve_cipher_suite("0xc02b"), Some(0xc02b));
        assert_eq!(resolve_extension("alpn"), Some(16));
        assert_eq!(resolve_extension("0xff01"), Some(65281));
        assert_eq!(resolve_extension("renegotiation_info"), Some(65281));
    }

    #[test]
    fn rejects_unknown_identifiers() {
        assert_eq!(resolve_cipher_suite("TLS_FAKE_WITH_NOTHING"), None);
        // a real suite the connector cannot offer
        assert_eq!(resolve_cipher_suite("0xc028"), None);
        assert_eq!(resolve_extension("application_settings"), None);
        assert_eq!(resolve_extension("0x4469"), None);
        assert_eq!(resolve_extension("0xzz"), None);
    }

    #[test]
    fn grease_detection() {
        for code in [0x0a0a, 0x1a1a, 0x2a2a, 0xfafa] {
            assert!(is_grease(code), "{code:#06x}");
        }
        assert!(!is_grease(0x1301));
        assert!(!is_grease(0x0a1a));
    }

    #[test]
    fn names_round_trip_through_tables() {
        for name in supported_cipher_suites() {
            let code = resolve_cipher_suite(name);
            assert!(code.is_some(), "{name}");
            assert_eq!(code.and_then(cipher_suite_name), Some(name));
        }
        for name in supported_extensions() {
            assert_eq!(resolve_extension(name).and_then(extension_name), Some(name));
        }
    }
}
