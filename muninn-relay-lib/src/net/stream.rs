use tokio::io::{AsyncRead, AsyncWrite};

/// Any byte stream a TLS session can run over: a plain TCP socket or a
/// tunnel through an HTTP proxy.
pub trait RawStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> RawStream for T {}

pub type BoxedStream = Box<dyn RawStream>;

pub fn boxed<S>(stream: S) -> BoxedStream
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    Box::new(stream)
}
