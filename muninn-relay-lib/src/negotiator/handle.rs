use bytes::Bytes;
use http::{Request, Response, Version};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::pool::PoolKey;
use crate::profile::FingerprintProfile;
use crate::telemetry::LiveConnectionGuard;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

pub const ALPN_H2: &str = "h2";

/// Request sender for the protocol the server picked during ALPN.
#[derive(Debug)]
pub enum HttpSender {
    Http1(http1::SendRequest<Full<Bytes>>),
    Http2(http2::SendRequest<Full<Bytes>>),
}

impl HttpSender {
    pub fn version(&self) -> Version {
        match self {
            Self::Http1(_) => Version::HTTP_11,
            Self::Http2(_) => Version::HTTP_2,
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Self::Http1(s) => s.is_closed(),
            Self::Http2(s) => s.is_closed(),
        }
    }

    pub async fn ready(&mut self) -> hyper::Result<()> {
        match self {
            Self::Http1(s) => s.ready().await,
            Self::Http2(s) => s.ready().await,
        }
    }

    pub async fn send(&mut self, req: Request<Full<Bytes>>) -> hyper::Result<Response<Incoming>> {
        match self {
            Self::Http1(s) => s.send_request(req).await,
            Self::Http2(s) => s.send_request(req).await,
        }
    }
}

/// One negotiated upstream connection.
///
/// The handle owns the task driving the HTTP connection, which in turn owns
/// the TLS session and the socket; dropping the handle aborts that task and
/// closes the socket. Handles are moved, never shared, so only one request
/// uses a connection at a time.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: u64,
    key: PoolKey,
    sender: HttpSender,
    alpn: Option<String>,
    driver: JoinHandle<()>,
    created_at: Instant,
    last_used: Instant,
    alive: bool,
    _live: LiveConnectionGuard,
}

impl ConnectionHandle {
    /// Run the HTTP client handshake over an established (usually TLS) stream.
    ///
    /// `alpn` is the protocol the server selected; `h2` gives an HTTP/2
    /// connection configured from the profile, anything else HTTP/1.1.
    pub async fn establish<S>(
        key: PoolKey,
        io: S,
        alpn: Option<String>,
        profile: &FingerprintProfile,
        live: LiveConnectionGuard,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        let io = TokioIo::new(io);
        let handshake_error = |e: hyper::Error| RelayError::HandshakeError {
            host: key.host().to_string(),
            reason: format!("http handshake: {e}"),
        };

        let (sender, driver) = if alpn.as_deref() == Some(ALPN_H2) {
            let settings = profile.http2();
            let mut builder = http2::Builder::new(TokioExecutor::new());
            builder
                .initial_stream_window_size(settings.initial_stream_window_size)
                .initial_connection_window_size(settings.initial_connection_window_size)
                .max_frame_size(settings.max_frame_size)
                .header_table_size(settings.header_table_size);
            if let Some(size) = settings.max_header_list_size {
                builder.max_header_list_size(size);
            }
            let (sender, conn) = builder.handshake(io).await.map_err(handshake_error)?;
            let driver = tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(handle_id = id, error = %e, "h2 connection closed with error");
                }
            });
            (HttpSender::Http2(sender), driver)
        } else {
            let (sender, conn) = http1::Builder::new()
                .title_case_headers(profile.http1_title_case())
                .handshake(io)
                .await
                .map_err(handshake_error)?;
            let driver = tokio::spawn(async move {
                if let Err(e) = conn.await {
                    debug!(handle_id = id, error = %e, "http/1.1 connection closed with error");
                }
            });
            (HttpSender::Http1(sender), driver)
        };

        let now = Instant::now();
        Ok(Self {
            id,
            key,
            sender,
            alpn,
            driver,
            created_at: now,
            last_used: now,
            alive: true,
            _live: live,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn alpn(&self) -> Option<&str> {
        self.alpn.as_deref()
    }

    pub fn version(&self) -> Version {
        self.sender.version()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Live until marked dead, closed by the peer, or its driver task ends.
    pub fn is_alive(&self) -> bool {
        self.alive && !self.sender.is_closed() && !self.driver.is_finished()
    }

    /// Never hand this connection out again.
    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub(crate) fn sender_mut(&mut self) -> &mut HttpSender {
        &mut self.sender
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.driver.abort();
    }
}
