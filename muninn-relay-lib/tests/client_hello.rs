mod helpers;

use helpers::{test_config, TestResult, TestServer};
use muninn_relay_lib::profile::registry::is_grease;
use muninn_relay_lib::{ClientHelloShape, Relay, RelayRequest};

const PADDING: u16 = 21;

/// Captured shape with GREASE normalised and the length-dependent padding
/// extension removed.
fn comparable(hello: &[u8]) -> TestResult<ClientHelloShape> {
    let mut shape = ClientHelloShape::parse(hello)?.normalize_grease();
    shape.extensions.retain(|&e| e != PADDING);
    Ok(shape)
}

#[tokio::test]
async fn test_chrome_120_cipher_order_matches_catalog() -> TestResult {
    let mut server = TestServer::spawn(&["h2", "http/1.1"]).await?;
    let relay = Relay::from_config(&test_config(), None)?;

    let response = relay.dispatch(RelayRequest::get(&server.url("/"), "chrome-120")?).await?;
    assert_eq!(response.status(), 200);

    let captured = ClientHelloShape::parse(&server.next_hello().await?)?;
    let offered: Vec<u16> =
        captured.cipher_suites.iter().copied().filter(|c| !is_grease(*c)).collect();
    let profile = relay.profiles().get_profile("chrome-120")?;
    assert_eq!(offered, profile.cipher_suites());
    assert!(is_grease(captured.cipher_suites[0]), "chrome leads with a GREASE cipher");
    Ok(())
}

#[tokio::test]
async fn test_captured_hello_matches_expected_shape() -> TestResult {
    let mut server = TestServer::spawn(&["h2", "http/1.1"]).await?;
    let relay = Relay::from_config(&test_config(), None)?;

    for id in ["chrome-120", "firefox-121", "safari-17"] {
        relay.dispatch(RelayRequest::get(&server.url("/"), id)?).await?;
        let captured = ClientHelloShape::parse(&server.next_hello().await?)?.structure();
        let expected =
            ClientHelloShape::expected(&relay.profiles().get_profile(id)?, Some("localhost"))
                .structure();
        assert_eq!(captured.cipher_suites, expected.cipher_suites, "{id} ciphers");
        assert_eq!(captured.extensions, expected.extensions, "{id} extension order");
        assert_eq!(captured.alpn, expected.alpn, "{id} alpn");
        assert_eq!(captured.server_name.as_deref(), Some("localhost"));
    }
    Ok(())
}

#[tokio::test]
async fn test_same_profile_produces_identical_hellos() -> TestResult {
    let mut server = TestServer::spawn(&["http/1.1"]).await?;
    let mut config = test_config();
    config.pool.enabled = false;
    let relay = Relay::from_config(&config, None)?;

    relay.dispatch(RelayRequest::get(&server.url("/"), "chrome-120")?).await?;
    relay.dispatch(RelayRequest::get(&server.url("/"), "chrome-120")?).await?;
    assert_eq!(server.connections(), 2);

    let first = comparable(&server.next_hello().await?)?;
    let second = comparable(&server.next_hello().await?)?;
    assert_eq!(first.cipher_suites, second.cipher_suites);
    assert_eq!(first.extensions, second.extensions);
    assert_eq!(first.alpn, second.alpn);
    assert_eq!(first.supported_groups, second.supported_groups);
    assert_eq!(first.signature_algorithms, second.signature_algorithms);
    Ok(())
}

#[tokio::test]
async fn test_profiles_differ_on_the_wire() -> TestResult {
    let mut server = TestServer::spawn(&["h2", "http/1.1"]).await?;
    let relay = Relay::from_config(&test_config(), None)?;

    relay.dispatch(RelayRequest::get(&server.url("/"), "chrome-120")?).await?;
    let chrome = ClientHelloShape::parse(&server.next_hello().await?)?;
    relay.dispatch(RelayRequest::get(&server.url("/"), "firefox-121")?).await?;
    let firefox = ClientHelloShape::parse(&server.next_hello().await?)?;

    assert_ne!(chrome.ja3_string(), firefox.ja3_string());
    assert!(!firefox.cipher_suites.iter().any(|c| is_grease(*c)), "firefox sends no GREASE");
    Ok(())
}
