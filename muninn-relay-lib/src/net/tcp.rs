use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{RelayError, Result};

const KEEPALIVE_TIME: Duration = Duration::from_secs(60);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Connect to the first address in `addrs` that accepts within `connect_timeout`.
///
/// Each address gets the full timeout. The error reports the last failure.
pub async fn connect_any(
    target: &str,
    addrs: &[SocketAddr],
    connect_timeout: Duration,
) -> Result<TcpStream> {
    let mut last_error = String::from("no addresses to try");
    for addr in addrs {
        match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                configure(&stream)?;
                trace!(%target, %addr, "tcp connected");
                return Ok(stream);
            }
            Ok(Err(e)) => {
                debug!(%target, %addr, error = %e, "tcp connect failed");
                last_error = e.to_string();
            }
            Err(_) => {
                debug!(%target, %addr, timeout_ms = connect_timeout.as_millis(), "tcp connect timed out");
                last_error = format!("timed out after {} ms", connect_timeout.as_millis());
            }
        }
    }
    Err(RelayError::ConnectError { target: target.to_string(), reason: last_error })
}

fn configure(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true)?;
    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_TIME)
        .with_interval(KEEPALIVE_INTERVAL);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    Ok(())
}
