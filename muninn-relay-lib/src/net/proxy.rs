use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http::header::{HOST, PROXY_AUTHORIZATION};
use http::{Method, Request, Uri};
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use std::fmt;
use std::str::FromStr;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::stream::{boxed, BoxedStream};
use crate::error::{RelayError, Result};

/// An upstream HTTP proxy reached with `CONNECT`.
///
/// Part of the pool key: two routes with different credentials are different
/// upstream identities. `Display` and `Debug` never print the password.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProxyRoute {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
}

impl ProxyRoute {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into().to_ascii_lowercase(), port, credentials: None }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn basic_auth(&self) -> Option<String> {
        self.credentials
            .as_ref()
            .map(|(user, password)| format!("Basic {}", STANDARD.encode(format!("{user}:{password}"))))
    }

    /// Ask the proxy for a tunnel to `host:port` over an already connected socket.
    ///
    /// Any non-2xx answer is a [`RelayError::ConnectError`].
    pub async fn establish_tunnel(
        &self,
        stream: TcpStream,
        host: &str,
        port: u16,
    ) -> Result<BoxedStream> {
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        let connect_error =
            |reason: String| RelayError::ConnectError { target: authority.clone(), reason };

        let (mut sender, conn) =
            hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(TokioIo::new(stream))
                .await
                .map_err(|e| connect_error(format!("proxy {self}: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                debug!(error = %e, "proxy tunnel connection ended");
            }
        });

        let mut req = Request::builder()
            .method(Method::CONNECT)
            .uri(authority.as_str())
            .header(HOST, authority.as_str());
        if let Some(auth) = self.basic_auth() {
            req = req.header(PROXY_AUTHORIZATION, auth);
        }
        let req = req
            .body(Empty::<Bytes>::new())
            .map_err(|e| connect_error(format!("invalid CONNECT request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| connect_error(format!("proxy {self}: {e}")))?;
        if !resp.status().is_success() {
            return Err(connect_error(format!("proxy {self} answered {}", resp.status())));
        }

        let upgraded = hyper::upgrade::on(resp)
            .await
            .map_err(|e| connect_error(format!("proxy {self} tunnel: {e}")))?;
        trace!(proxy = %self, target = %authority, "tunnel established");
        Ok(boxed(TokioIo::new(upgraded)))
    }
}

impl fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credentials {
            Some((user, _)) => write!(f, "http://{user}:***@{}:{}", self.host, self.port),
            None => write!(f, "http://{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Debug for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyRoute({self})")
    }
}

/// Parses `http://[user:password@]host:port` or bare `host:port`.
impl FromStr for ProxyRoute {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| RelayError::InvalidRequest(format!("proxy '{s}': {reason}"));
        let with_scheme = if s.contains("://") { s.to_string() } else { format!("http://{s}") };
        let uri: Uri = with_scheme.parse().map_err(|_| invalid("not a valid URI"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// proxies are supported"));
        }
        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let host = authority.host();
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = authority.port_u16().unwrap_or(8080);

        let mut route = ProxyRoute::new(host, port);
        if let Some((userinfo, _)) = authority.as_str().rsplit_once('@') {
            let (user, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
            route = route.with_credentials(user, password);
        }
        Ok(route)
    }
}
