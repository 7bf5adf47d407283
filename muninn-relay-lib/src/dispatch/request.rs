use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::net::ProxyRoute;

const DEFAULT_HTTPS_PORT: u16 = 443;

/// One request to relay through a fingerprint profile.
///
/// Header keys are case-insensitive and keep insertion order; setting a key
/// that already exists replaces its value in place.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    method: Method,
    url: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
    profile: String,
    proxy: Option<ProxyRoute>,
    timeout: Option<Duration>,
    decompress: bool,
}

impl RelayRequest {
    pub fn new(method: Method, url: &str, profile: impl Into<String>) -> Result<Self> {
        let url: Uri = url
            .parse()
            .map_err(|e| RelayError::InvalidRequest(format!("invalid url '{url}': {e}")))?;
        if url.host().is_none() {
            return Err(RelayError::InvalidRequest(format!("url '{url}' has no host")));
        }
        Ok(Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            profile: profile.into(),
            proxy: None,
            timeout: None,
            decompress: true,
        })
    }

    pub fn get(url: &str, profile: impl Into<String>) -> Result<Self> {
        Self::new(Method::GET, url, profile)
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RelayError::InvalidRequest(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RelayError::InvalidRequest(format!("invalid value for header '{name}': {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Like [`header`](Self::header) but keeps existing values of `name`.
    pub fn append_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn proxy(mut self, route: ProxyRoute) -> Self {
        self.proxy = Some(route);
        self
    }

    /// Overall deadline for the call, retry included. Unset means the
    /// dispatcher's configured request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Undo `content-encoding` on the response body (default: true).
    pub fn decompress(mut self, enabled: bool) -> Self {
        self.decompress = enabled;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn proxy_route(&self) -> Option<&ProxyRoute> {
        self.proxy.as_ref()
    }

    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn wants_decompression(&self) -> bool {
        self.decompress
    }

    /// Host (without IPv6 brackets) and port to connect to.
    ///
    /// Only `https` targets can be relayed; the fingerprint lives in the TLS
    /// handshake.
    pub fn target(&self) -> Result<(String, u16)> {
        match self.url.scheme_str() {
            Some("https") => {}
            Some(other) => {
                return Err(RelayError::InvalidRequest(format!(
                    "unsupported scheme '{other}', only https can be relayed"
                )))
            }
            None => {
                return Err(RelayError::InvalidRequest(format!(
                    "url '{}' must be absolute",
                    self.url
                )))
            }
        }
        let host = self
            .url
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RelayError::InvalidRequest(format!("url '{}' has no host", self.url)))?;
        let port = self.url.port_u16().unwrap_or(DEFAULT_HTTPS_PORT);
        Ok((host.to_ascii_lowercase(), port))
    }

    /// Value for the HTTP/1.1 `host` header: the port is omitted when it is 443.
    pub(crate) fn host_header(&self) -> Result<HeaderValue> {
        let (host, port) = self.target()?;
        let host = if host.contains(':') { format!("[{host}]") } else { host };
        let value = if port == DEFAULT_HTTPS_PORT { host } else { format!("{host}:{port}") };
        HeaderValue::from_str(&value)
            .map_err(|e| RelayError::InvalidRequest(format!("invalid host '{value}': {e}")))
    }

    /// `path?query`, `/` when the url has no path.
    pub(crate) fn origin_form(&self) -> Result<Uri> {
        let path = self.url.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let path = if path.is_empty() { "/" } else { path };
        path.parse()
            .map_err(|e| RelayError::InvalidRequest(format!("invalid request path '{path}': {e}")))
    }
}
