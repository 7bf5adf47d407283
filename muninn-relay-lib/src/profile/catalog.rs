//! Built-in browser profiles.
//!
//! Orders are the ones the browsers send without extension permutation.
//! Identifiers BoringSSL cannot emit (ALPS, ffdhe groups, CBC-SHA384 suites)
//! are left out, so each entry is exactly what goes on the wire.

use super::definition::{ExtensionDefinition, HeaderDefinition, ProfileDefinition};
use super::types::Http2Settings;

pub const CHROME_120: &str = "chrome-120";
pub const FIREFOX_121: &str = "firefox-121";
pub const SAFARI_17: &str = "safari-17";
pub const EDGE_120: &str = "edge-120";

/// Every built-in definition, in listing order.
pub fn builtin_definitions() -> Vec<ProfileDefinition> {
    vec![chrome_120(), firefox_121(), safari_17(), edge_120()]
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn ext(name: &str) -> ExtensionDefinition {
    ExtensionDefinition::named(name)
}

fn ext_groups(groups: &[&str]) -> ExtensionDefinition {
    ExtensionDefinition { groups: strings(groups), ..ext("supported_groups") }
}

fn ext_algorithms(name: &str, algorithms: &[&str]) -> ExtensionDefinition {
    ExtensionDefinition { algorithms: strings(algorithms), ..ext(name) }
}

fn headers(pairs: &[(&str, &str)]) -> Vec<HeaderDefinition> {
    pairs
        .iter()
        .map(|(name, value)| HeaderDefinition { name: name.to_string(), value: value.to_string() })
        .collect()
}

const CHROME_SIGALGS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

const CHROME_HEADER_ORDER: &[&str] = &[
    "host",
    "connection",
    "cache-control",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "upgrade-insecure-requests",
    "user-agent",
    "accept",
    "sec-fetch-site",
    "sec-fetch-mode",
    "sec-fetch-user",
    "sec-fetch-dest",
    "accept-encoding",
    "accept-language",
    "cookie",
];

const CHROME_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

pub fn chrome_120() -> ProfileDefinition {
    ProfileDefinition {
        id: CHROME_120.to_string(),
        cipher_suites: strings(&[
            "TLS_AES_128_GCM_SHA256",
            "TLS_AES_256_GCM_SHA384",
            "TLS_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
            "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
            "TLS_RSA_WITH_AES_128_GCM_SHA256",
            "TLS_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_RSA_WITH_AES_128_CBC_SHA",
            "TLS_RSA_WITH_AES_256_CBC_SHA",
        ]),
        extensions: vec![
            ext("server_name"),
            ext("extended_master_secret"),
            ext("renegotiation_info"),
            ext_groups(&["X25519", "P-256", "P-384"]),
            ext("ec_point_formats"),
            ext("session_ticket"),
            ext("application_layer_protocol_negotiation"),
            ext("status_request"),
            ext_algorithms("signature_algorithms", CHROME_SIGALGS),
            ext("signed_certificate_timestamp"),
            ext("key_share"),
            ext("psk_key_exchange_modes"),
            ext("supported_versions"),
            ext_algorithms("compress_certificate", &["brotli"]),
            ext("encrypted_client_hello"),
            ext("padding"),
        ],
        tls_versions: strings(&["1.3", "1.2"]),
        alpn: strings(&["h2", "http/1.1"]),
        grease: true,
        http2: Http2Settings {
            header_table_size: Some(65_536),
            enable_push: Some(false),
            max_concurrent_streams: None,
            initial_stream_window_size: Some(6_291_456),
            initial_connection_window_size: Some(15_728_640),
            max_frame_size: None,
            max_header_list_size: Some(262_144),
        },
        http1_title_case: false,
        header_order: strings(CHROME_HEADER_ORDER),
        default_headers: headers(&[
            ("sec-ch-ua", r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", r#""Windows""#),
            ("upgrade-insecure-requests", "1"),
            (
                "user-agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/120.0.0.0 Safari/537.36",
            ),
            ("accept", CHROME_ACCEPT),
            ("sec-fetch-site", "none"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-user", "?1"),
            ("sec-fetch-dest", "document"),
            ("accept-encoding", "gzip, deflate, br"),
            ("accept-language", "en-US,en;q=0.9"),
        ]),
    }
}

/// Same handshake as Chrome 120; only the client hints and user agent differ.
pub fn edge_120() -> ProfileDefinition {
    let chrome = chrome_120();
    let default_headers = chrome
        .default_headers
        .into_iter()
        .map(|mut h| {
            match h.name.as_str() {
                "sec-ch-ua" => {
                    h.value = r#""Not_A Brand";v="8", "Chromium";v="120", "Microsoft Edge";v="120""#
                        .to_string()
                }
                "user-agent" => h.value.push_str(" Edg/120.0.0.0"),
                _ => {}
            }
            h
        })
        .collect();
    ProfileDefinition { id: EDGE_120.to_string(), default_headers, ..chrome }
}

pub fn firefox_121() -> ProfileDefinition {
    ProfileDefinition {
        id: FIREFOX_121.to_string(),
        cipher_suites: strings(&[
            "TLS_AES_128_GCM_SHA256",
            "TLS_CHACHA20_POLY1305_SHA256",
            "TLS_AES_256_GCM_SHA384",
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
            "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
            "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
            "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
            "TLS_RSA_WITH_AES_128_GCM_SHA256",
            "TLS_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_RSA_WITH_AES_128_CBC_SHA",
            "TLS_RSA_WITH_AES_256_CBC_SHA",
        ]),
        extensions: vec![
            ext("server_name"),
            ext("extended_master_secret"),
            ext("renegotiation_info"),
            ext_groups(&["X25519", "P-256", "P-384", "P-521"]),
            ext("ec_point_formats"),
            ext("session_ticket"),
            ext("application_layer_protocol_negotiation"),
            ext("status_request"),
            ext_algorithms(
                "delegated_credentials",
                &[
                    "ecdsa_secp256r1_sha256",
                    "ecdsa_secp384r1_sha384",
                    "ecdsa_secp521r1_sha512",
                    "ecdsa_sha1",
                ],
            ),
            ext("key_share"),
            ext("supported_versions"),
            ext_algorithms(
                "signature_algorithms",
                &[
                    "ecdsa_secp256r1_sha256",
                    "ecdsa_secp384r1_sha384",
                    "ecdsa_secp521r1_sha512",
                    "rsa_pss_rsae_sha256",
                    "rsa_pss_rsae_sha384",
                    "rsa_pss_rsae_sha512",
                    "rsa_pkcs1_sha256",
                    "rsa_pkcs1_sha384",
                    "rsa_pkcs1_sha512",
                    "ecdsa_sha1",
                    "rsa_pkcs1_sha1",
                ],
            ),
            ext("psk_key_exchange_modes"),
            ExtensionDefinition { limit: Some(16_385), ..ext("record_size_limit") },
            ext("encrypted_client_hello"),
        ],
        tls_versions: strings(&["1.3", "1.2"]),
        alpn: strings(&["h2", "http/1.1"]),
        grease: false,
        http2: Http2Settings {
            header_table_size: Some(65_536),
            enable_push: Some(false),
            max_concurrent_streams: None,
            initial_stream_window_size: Some(131_072),
            initial_connection_window_size: Some(12_582_912),
            max_frame_size: Some(16_384),
            max_header_list_size: None,
        },
        http1_title_case: true,
        header_order: strings(&[
            "host",
            "user-agent",
            "accept",
            "accept-language",
            "accept-encoding",
            "connection",
            "cookie",
            "upgrade-insecure-requests",
            "sec-fetch-dest",
            "sec-fetch-mode",
            "sec-fetch-site",
            "sec-fetch-user",
            "te",
        ]),
        default_headers: headers(&[
            (
                "user-agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            ),
            (
                "accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
            ("accept-language", "en-US,en;q=0.5"),
            ("accept-encoding", "gzip, deflate, br"),
            ("upgrade-insecure-requests", "1"),
            ("sec-fetch-dest", "document"),
            ("sec-fetch-mode", "navigate"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-user", "?1"),
        ]),
    }
}

pub fn safari_17() -> ProfileDefinition {
    ProfileDefinition {
        id: SAFARI_17.to_string(),
        cipher_suites: strings(&[
            "TLS_AES_128_GCM_SHA256",
            "TLS_AES_256_GCM_SHA384",
            "TLS_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
            "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
            "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
            "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
            "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
            "TLS_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_RSA_WITH_AES_128_GCM_SHA256",
            "TLS_RSA_WITH_AES_256_CBC_SHA",
            "TLS_RSA_WITH_AES_128_CBC_SHA",
            "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        ]),
        extensions: vec![
            ext("server_name"),
            ext("extended_master_secret"),
            ext("renegotiation_info"),
            ext_groups(&["X25519", "P-256", "P-384", "P-521"]),
            ext("ec_point_formats"),
            ext("application_layer_protocol_negotiation"),
            ext("status_request"),
            ext_algorithms(
                "signature_algorithms",
                &[
                    "ecdsa_secp256r1_sha256",
                    "rsa_pss_rsae_sha256",
                    "rsa_pkcs1_sha256",
                    "ecdsa_secp384r1_sha384",
                    "ecdsa_sha1",
                    "rsa_pss_rsae_sha384",
                    "rsa_pkcs1_sha384",
                    "rsa_pss_rsae_sha512",
                    "rsa_pkcs1_sha512",
                    "rsa_pkcs1_sha1",
                ],
            ),
            ext("signed_certificate_timestamp"),
            ext("key_share"),
            ext("psk_key_exchange_modes"),
            ext("supported_versions"),
            ext_algorithms("compress_certificate", &["zlib"]),
            ext("padding"),
        ],
        tls_versions: strings(&["1.3", "1.2", "1.1", "1.0"]),
        alpn: strings(&["h2", "http/1.1"]),
        grease: true,
        http2: Http2Settings {
            header_table_size: Some(4_096),
            enable_push: Some(false),
            max_concurrent_streams: Some(100),
            initial_stream_window_size: Some(2_097_152),
            initial_connection_window_size: Some(10_485_760),
            max_frame_size: None,
            max_header_list_size: None,
        },
        http1_title_case: true,
        header_order: strings(&[
            "host",
            "accept",
            "sec-fetch-site",
            "cookie",
            "sec-fetch-dest",
            "accept-language",
            "sec-fetch-mode",
            "user-agent",
            "accept-encoding",
            "connection",
        ]),
        default_headers: headers(&[
            ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            ("sec-fetch-site", "none"),
            ("sec-fetch-dest", "document"),
            ("accept-language", "en-US,en;q=0.9"),
            ("sec-fetch-mode", "navigate"),
            (
                "user-agent",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
            ),
            ("accept-encoding", "gzip, deflate, br"),
        ]),
    }
}
