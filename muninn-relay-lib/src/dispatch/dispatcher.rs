use bytes::Bytes;
use http::header::{CONNECTION, HOST, TRANSFER_ENCODING, UPGRADE};
use http::response::Parts;
use http::{HeaderMap, HeaderName, Request, Version};
use http_body_util::{BodyExt, Full};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::decode::decode_body;
use super::headers::{apply_default_headers, apply_header_order};
use super::request::RelayRequest;
use super::response::RelayResponse;
use crate::error::{RelayError, Result};
use crate::negotiator::{Connect, HttpSender, Negotiator};
use crate::pool::{ConnectionPool, PoolKey};
use crate::profile::{FingerprintProfile, ProfileStore};
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// First attempt plus one retry on a fresh connection.
const MAX_ATTEMPTS: u32 = 2;

/// Headers HTTP/2 forbids; callers may still set them for HTTP/1.1 targets.
const H1_ONLY_HEADERS: [HeaderName; 5] = [
    HOST,
    CONNECTION,
    TRANSFER_ENCODING,
    UPGRADE,
    HeaderName::from_static("keep-alive"),
];

fn transport_error(e: hyper::Error) -> RelayError {
    match std::error::Error::source(&e) {
        Some(source) => RelayError::Transport(format!("{e}: {source}")),
        None => RelayError::Transport(e.to_string()),
    }
}

fn protocol_label(version: Version) -> &'static str {
    if version == Version::HTTP_2 {
        "h2"
    } else {
        "http/1.1"
    }
}

/// Whether the server asked to close the connection after this response.
fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("close"))
}

/// Turn a relay request into the HTTP request sent on a connection of
/// `version`, with the profile's default headers and header order applied.
pub(crate) fn build_request(
    request: &RelayRequest,
    profile: &FingerprintProfile,
    version: Version,
) -> Result<Request<Full<Bytes>>> {
    let mut headers = request.headers().clone();
    apply_default_headers(&mut headers, profile.default_headers());

    let uri = if version == Version::HTTP_2 {
        // HeaderMap::remove swap-removes, so rebuild to keep caller order
        headers = headers
            .iter()
            .filter(|(name, _)| !H1_ONLY_HEADERS.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        request.url().clone()
    } else {
        if !headers.contains_key(HOST) {
            let mut with_host = HeaderMap::with_capacity(headers.len().saturating_add(1));
            with_host.insert(HOST, request.host_header()?);
            with_host.extend(headers);
            headers = with_host;
        }
        request.origin_form()?
    };
    let headers = apply_header_order(headers, profile.header_order());

    let body = request.body_bytes().cloned().unwrap_or_default();
    let mut outgoing = Request::builder()
        .method(request.method().clone())
        .uri(uri)
        .version(version)
        .body(Full::new(body))
        .map_err(|e| RelayError::InvalidRequest(e.to_string()))?;
    *outgoing.headers_mut() = headers;
    Ok(outgoing)
}

async fn exchange(sender: &mut HttpSender, request: Request<Full<Bytes>>) -> Result<(Parts, Bytes)> {
    sender.ready().await.map_err(transport_error)?;
    let response = sender.send(request).await.map_err(transport_error)?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await.map_err(transport_error)?.to_bytes();
    Ok((parts, body))
}

/// Sends relay requests over pooled, fingerprinted connections.
///
/// A request whose first attempt fails in transport (connect, handshake,
/// reset or closed connection) gets exactly one more attempt on a freshly
/// negotiated connection; the failed connection is dropped, never pooled.
/// The request timeout is one deadline covering both attempts.
pub struct Dispatcher<C = Negotiator> {
    store: Arc<ProfileStore>,
    pool: Arc<ConnectionPool<C>>,
    default_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl<C: Connect> Dispatcher<C> {
    pub fn new(
        store: Arc<ProfileStore>,
        pool: Arc<ConnectionPool<C>>,
        default_timeout: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { store, pool, default_timeout, metrics }
    }

    pub fn store(&self) -> &Arc<ProfileStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<ConnectionPool<C>> {
        &self.pool
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub async fn dispatch(&self, request: RelayRequest) -> Result<RelayResponse> {
        let start = Instant::now();
        let result = self.run(&request, start).await;
        match &result {
            Ok(response) => {
                debug!(
                    profile = %response.profile(),
                    method = %request.method(),
                    url = %request.url(),
                    status = response.status().as_u16(),
                    attempts = response.attempts(),
                    elapsed_ms = response.elapsed().as_millis(),
                    "request relayed"
                );
                if let Some(m) = &self.metrics {
                    m.record_request(
                        response.profile(),
                        request.method().as_str(),
                        response.status().as_u16(),
                        protocol_label(response.version()),
                        response.elapsed().as_secs_f64(),
                    );
                }
            }
            Err(e) => {
                debug!(
                    profile = %request.profile(),
                    url = %request.url(),
                    error = %e,
                    "relay failed"
                );
                if let Some(m) = &self.metrics {
                    m.record_request_error(request.profile(), e.error_type());
                }
            }
        }
        result
    }

    async fn run(&self, request: &RelayRequest, start: Instant) -> Result<RelayResponse> {
        let profile = self.store.get_profile(request.profile())?;
        let (host, port) = request.target()?;
        let key = PoolKey::new(&host, port, profile.id(), request.proxy_route().cloned());
        let timeout = request.timeout_override().unwrap_or(self.default_timeout);
        let deadline = start + timeout;

        let mut attempt = 1u32;
        loop {
            match self.attempt(request, &key, &profile, deadline, timeout, attempt).await {
                Ok((parts, body)) => {
                    let mut headers = parts.headers;
                    let body = if request.wants_decompression() {
                        match decode_body(&mut headers, body.clone()) {
                            Ok(decoded) => decoded,
                            Err(e) => {
                                warn!(%key, error = %e, "could not decode response body, returning it as received");
                                body
                            }
                        }
                    } else {
                        body
                    };
                    return Ok(RelayResponse {
                        status: parts.status,
                        version: parts.version,
                        headers,
                        body,
                        elapsed: start.elapsed(),
                        profile: profile.id().to_string(),
                        attempts: attempt,
                    });
                }
                Err(e) if attempt < MAX_ATTEMPTS && e.is_retryable() && Instant::now() < deadline => {
                    warn!(%key, attempt, error = %e, "transport failure, retrying on a fresh connection");
                    if let Some(m) = &self.metrics {
                        m.record_retry(profile.id(), e.error_type());
                    }
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        request: &RelayRequest,
        key: &PoolKey,
        profile: &Arc<FingerprintProfile>,
        deadline: Instant,
        timeout: Duration,
        attempt: u32,
    ) -> Result<(Parts, Bytes)> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.response_timeout(timeout));
        }
        let mut handle = if attempt == 1 {
            self.pool.acquire_key(key, profile, remaining).await?
        } else {
            self.pool.negotiate_fresh(key, profile, remaining).await?
        };

        let outgoing = match build_request(request, profile, handle.version()) {
            Ok(outgoing) => outgoing,
            Err(e) => {
                self.pool.release(handle);
                return Err(e);
            }
        };

        trace!(handle_id = handle.id(), %key, attempt, "sending request");
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, exchange(handle.sender_mut(), outgoing)).await {
            Ok(Ok((parts, body))) => {
                if wants_close(&parts.headers) {
                    trace!(handle_id = handle.id(), "server closed the connection, not pooling");
                } else {
                    self.pool.release(handle);
                }
                Ok((parts, body))
            }
            Ok(Err(e)) => {
                debug!(handle_id = handle.id(), %key, error = %e, "dropping failed connection");
                handle.mark_dead();
                Err(e)
            }
            Err(_) => {
                debug!(handle_id = handle.id(), %key, "response timed out, dropping connection");
                handle.mark_dead();
                Err(self.response_timeout(timeout))
            }
        }
    }

    fn response_timeout(&self, timeout: Duration) -> RelayError {
        if let Some(m) = &self.metrics {
            m.record_timeout(values::TIMEOUT_RESPONSE);
        }
        RelayError::ResponseTimeout(timeout.as_millis())
    }
}

impl<C> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("profiles", &self.store.len())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ExtensionDefinition, Http2Settings, ProfileDefinition};
    use http::HeaderValue;

    fn chrome() -> Result<Arc<FingerprintProfile>> {
        ProfileStore::builtin()?.get_profile("chrome-120")
    }

    fn header_names<B>(req: &Request<B>) -> Vec<&str> {
        req.headers().keys().map(HeaderName::as_str).collect()
    }

    #[test]
    fn http1_request_uses_origin_form_and_host_first() -> Result<()> {
        let profile = chrome()?;
        let request = RelayRequest::get("https://example.com:8443/path?q=1", "chrome-120")?
            .header("x-trace", "abc")?;
        let built = build_request(&request, &profile, Version::HTTP_11)?;
        assert_eq!(built.uri(), "/path?q=1");
        assert_eq!(built.headers()[HOST], "example.com:8443");
        assert_eq!(header_names(&built).last().copied(), Some("x-trace"));
        Ok(())
    }

    #[test]
    fn http2_request_is_absolute_without_connection_headers() -> Result<()> {
        let profile = chrome()?;
        let request = RelayRequest::get("https://example.com/", "chrome-120")?
            .header("connection", "keep-alive")?
            .header("host", "example.com")?;
        let built = build_request(&request, &profile, Version::HTTP_2)?;
        assert_eq!(built.uri(), "https://example.com/");
        assert!(built.headers().get(CONNECTION).is_none());
        assert!(built.headers().get(HOST).is_none());
        Ok(())
    }

    #[test]
    fn http2_keeps_caller_order_when_dropping_connection_headers() -> Result<()> {
        let bare = ProfileDefinition {
            id: "bare".to_string(),
            cipher_suites: vec!["TLS_AES_128_GCM_SHA256".to_string()],
            extensions: vec![
                ExtensionDefinition::named("server_name"),
                ExtensionDefinition::named("alpn"),
            ],
            tls_versions: vec!["1.3".to_string()],
            alpn: vec!["h2".to_string()],
            grease: false,
            http2: Http2Settings::default(),
            http1_title_case: false,
            header_order: Vec::new(),
            default_headers: Vec::new(),
        }
        .build()?;
        let request = RelayRequest::get("https://example.com/", "bare")?
            .header("x-a", "1")?
            .header("connection", "keep-alive")?
            .header("x-b", "2")?
            .append_header(HeaderName::from_static("x-b"), HeaderValue::from_static("3"))
            .header("x-c", "4")?;

        let built = build_request(&request, &bare, Version::HTTP_2)?;
        assert_eq!(header_names(&built), vec!["x-a", "x-b", "x-c"]);
        let x_b: Vec<_> = built.headers().get_all("x-b").iter().collect();
        assert_eq!(x_b, ["2", "3"]);
        Ok(())
    }

    #[test]
    fn caller_headers_win_over_profile_defaults() -> Result<()> {
        let profile = chrome()?;
        let request = RelayRequest::get("https://example.com/", "chrome-120")?
            .header("user-agent", "custom-agent")?;
        let built = build_request(&request, &profile, Version::HTTP_2)?;
        assert_eq!(built.headers()["user-agent"], "custom-agent");
        assert_eq!(built.headers().get_all("user-agent").iter().count(), 1);
        Ok(())
    }

    #[test]
    fn close_detection_is_token_based() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade, Close"));
        assert!(wants_close(&headers));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        assert!(!wants_close(&headers));
        assert!(!wants_close(&HeaderMap::new()));
    }
}
