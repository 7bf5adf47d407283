use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::profile::ProfileStore;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| RelayError::Config(format!("Failed to read config file: {e}")))?;
    load_from_str(&txt)
}

pub fn load_from_str(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt)
        .map_err(|e| RelayError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

/// Check values serde cannot: ranges, referenced files, and profile definitions.
///
/// Invalid `[[profiles]]` entries surface as
/// [`RelayError::InvalidProfileDefinition`]; everything else as
/// [`RelayError::Config`].
pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.pool.enabled {
        if cfg.pool.idle_timeout_ms == 0 {
            return Err(RelayError::Config("pool.idle_timeout_ms must be greater than 0".into()));
        }
        if cfg.pool.max_idle_per_key == 0 {
            return Err(RelayError::Config("pool.max_idle_per_key must be greater than 0".into()));
        }
        if cfg.pool.reap_interval_ms == 0 {
            return Err(RelayError::Config("pool.reap_interval_ms must be greater than 0".into()));
        }
    }

    for (name, value) in [
        ("timeout.connect_ms", cfg.timeout.connect_ms),
        ("timeout.tls_handshake_ms", cfg.timeout.tls_handshake_ms),
        ("timeout.request_ms", cfg.timeout.request_ms),
    ] {
        if value == 0 {
            return Err(RelayError::Config(format!("{name} must be greater than 0")));
        }
    }

    if cfg.dns.min_ttl_secs > cfg.dns.max_ttl_secs {
        return Err(RelayError::Config(format!(
            "dns.min_ttl_secs ({}) exceeds dns.max_ttl_secs ({})",
            cfg.dns.min_ttl_secs, cfg.dns.max_ttl_secs
        )));
    }

    if let Some(ca_file) = &cfg.tls.ca_file {
        if !ca_file.exists() {
            return Err(RelayError::Config(format!(
                "CA file not found: {}",
                ca_file.display()
            )));
        }
    }

    if !LOG_LEVELS.contains(&cfg.logging.level.to_ascii_lowercase().as_str()) {
        return Err(RelayError::Config(format!(
            "Unknown log level '{}', expected one of {}",
            cfg.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    let store = ProfileStore::with_extra(&cfg.profiles)?;
    if !store.contains(&cfg.default_profile) {
        return Err(RelayError::Config(format!(
            "default_profile '{}' is not a known profile",
            cfg.default_profile
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>
    {
        let cfg = load_from_str("")?;
        assert_eq!(cfg.default_profile, "chrome-120");
        assert!(cfg.pool.enabled);
        assert_eq!(cfg.pool.max_idle_per_key, 8);
        assert_eq!(cfg.timeout.request_ms, 30_000);
        assert!(cfg.tls.verify);
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.telemetry.metrics_enabled);
        Ok(())
    }

    #[test]
    fn rejects_zero_pool_size() {
        let err = load_from_str("[pool]\nmax_idle_per_key = 0\n");
        assert!(matches!(err, Err(RelayError::Config(msg)) if msg.contains("max_idle_per_key")));
    }

    #[test]
    fn disabled_pool_skips_pool_checks() {
        assert!(load_from_str("[pool]\nenabled = false\nmax_idle_per_key = 0\n").is_ok());
    }

    #[test]
    fn rejects_inverted_dns_ttls() {
        let err = load_from_str("[dns]\nmin_ttl_secs = 60\nmax_ttl_secs = 10\n");
        assert!(matches!(err, Err(RelayError::Config(_))));
    }

    #[test]
    fn rejects_unknown_default_profile() {
        let err = load_from_str("default_profile = \"lynx-2\"\n");
        assert!(matches!(err, Err(RelayError::Config(msg)) if msg.contains("lynx-2")));
    }

    #[test]
    fn rejects_bad_log_level() {
        assert!(load_from_str("[logging]\nlevel = \"loud\"\n").is_err());
    }

    #[test]
    fn invalid_extra_profile_is_reported_as_such() {
        let err = load_from_str(
            r#"
            [[profiles]]
            id = "broken"
            cipher_suites = ["TLS_AES_128_GCM_SHA256"]
            alpn = []
            extensions = [{ name = "server_name" }]
            "#,
        );
        assert!(matches!(
            err,
            Err(RelayError::InvalidProfileDefinition { profile, .. }) if profile == "broken"
        ));
    }
}
