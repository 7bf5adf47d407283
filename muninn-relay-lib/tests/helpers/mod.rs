//! Shared test helpers: a local TLS endpoint that records every ClientHello
//! it receives, and relay configs that trust it.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use muninn_relay_lib::telemetry::LiveConnectionGuard;
use muninn_relay_lib::{
    read_client_hello, Config, Connect, ConnectionHandle, FingerprintProfile, PoolKey,
    PrefixedStream,
};
use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Generate a self-signed certificate for `localhost` as DER
pub fn generate_valid_test_cert_der() -> TestResult<(
    rustls_pki_types::CertificateDer<'static>,
    rustls_pki_types::PrivateKeyDer<'static>,
)> {
    let subject_alt_names = vec!["localhost".to_string()];
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(subject_alt_names)?;

    let cert_der = rustls_pki_types::CertificateDer::from(cert.der().to_vec());
    let key_der = rustls_pki_types::PrivateKeyDer::Pkcs8(
        rustls_pki_types::PrivatePkcs8KeyDer::from(signing_key.serialize_der()),
    );

    Ok((cert_der, key_der))
}

/// Relay config for talking to [`TestServer`]: certificate checks off,
/// short timeouts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.tls.verify = false;
    config.timeout.connect_ms = 2_000;
    config.timeout.tls_handshake_ms = 2_000;
    config.timeout.request_ms = 5_000;
    config
}

async fn handle(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, http::Error> {
    match req.uri().path() {
        "/close" => Response::builder()
            .header("connection", "close")
            .body(Full::new(Bytes::from_static(b"bye"))),
        "/gzip" => {
            let mut enc =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            let compressed = enc
                .write_all(b"compressed hello")
                .and_then(|_| enc.finish())
                .unwrap_or_default();
            Response::builder()
                .header("content-encoding", "gzip")
                .body(Full::new(Bytes::from(compressed)))
        }
        _ => {
            // echo request header names in arrival order
            let names: Vec<&str> = req.headers().keys().map(|k| k.as_str()).collect();
            Response::builder()
                .header("x-echo-version", format!("{:?}", req.version()))
                .body(Full::new(Bytes::from(names.join("\n"))))
        }
    }
}

/// A local TLS endpoint speaking HTTP/1.1 and HTTP/2 behind rustls.
///
/// Each accepted connection's raw ClientHello record is sent on `hellos`
/// before the handshake continues.
pub struct TestServer {
    pub addr: SocketAddr,
    hellos: mpsc::UnboundedReceiver<Vec<u8>>,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(alpn: &[&str]) -> TestResult<Self> {
        let (cert, key) = generate_valid_test_cert_der()?;
        let mut server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert], key)?;
        server_config.alpn_protocols = alpn.iter().map(|p| p.as_bytes().to_vec()).collect();
        let acceptor = TlsAcceptor::from(Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, hellos) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        let task = tokio::spawn(async move {
            while let Ok((mut tcp, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let acceptor = acceptor.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let Ok(hello) = read_client_hello(&mut tcp).await else { return };
                    let _ = tx.send(hello.clone());
                    let Ok(tls) = acceptor.accept(PrefixedStream::new(hello, tcp)).await else {
                        return;
                    };
                    let _ = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(tls), service_fn(handle))
                        .await;
                });
            }
        });

        Ok(Self { addr, hellos, accepted, task })
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://localhost:{}{path}", self.addr.port())
    }

    pub async fn next_hello(&mut self) -> TestResult<Vec<u8>> {
        let hello = tokio::time::timeout(Duration::from_secs(5), self.hellos.recv())
            .await?
            .ok_or("test server stopped")?;
        Ok(hello)
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connector that serves every "connection" from an in-memory HTTP/1.1
/// server, so pool and dispatcher behaviour can be tested without TLS.
///
/// The first `broken_first` connections are closed by the peer before any
/// request is read.
#[derive(Debug, Default)]
pub struct DuplexConnector {
    calls: AtomicUsize,
    broken_first: usize,
    delay: Option<Duration>,
}

impl DuplexConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken_first(mut self, count: usize) -> Self {
        self.broken_first = count;
        self
    }

    /// Delay every response by `delay`.
    pub fn respond_after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Connect for DuplexConnector {
    fn connect(
        &self,
        key: &PoolKey,
        profile: &Arc<FingerprintProfile>,
        _timeout: Duration,
    ) -> impl Future<Output = muninn_relay_lib::Result<ConnectionHandle>> + Send {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let broken = n < self.broken_first;
        let delay = self.delay;
        let key = key.clone();
        let profile = Arc::clone(profile);
        async move {
            let (client, server) = tokio::io::duplex(64 * 1024);
            if broken {
                drop(server);
            } else {
                tokio::spawn(async move {
                    let service = service_fn(move |req| async move {
                        if let Some(delay) = delay {
                            tokio::time::sleep(delay).await;
                        }
                        handle(req).await
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(server), service)
                        .await;
                });
            }
            ConnectionHandle::establish(key, client, None, &profile, LiveConnectionGuard::new(None))
                .await
        }
    }
}
