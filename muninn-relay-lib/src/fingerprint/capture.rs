use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};

const MAX_HELLO_BYTES: usize = 64 * 1024;

/// Read the first TLS record from `stream` without interpreting it.
///
/// Stops once the record announced in the 5-byte header is complete, at EOF,
/// or after 64 KiB. Pair with [`PrefixedStream`] to hand the bytes back to a
/// TLS acceptor.
pub async fn read_client_hello<S>(stream: &mut S) -> std::io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(8192);
    loop {
        if buf.len() >= 5 {
            let len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
            let needed = len.saturating_add(5);
            if buf.len() >= needed {
                break;
            }
        }
        let read = stream.read_buf(&mut buf).await?;
        if read == 0 {
            break;
        }
        if buf.len() > MAX_HELLO_BYTES {
            break;
        }
    }
    Ok(buf)
}

/// Replays `prefix` before reading from `inner`; writes go straight through.
pub struct PrefixedStream<S> {
    prefix: Vec<u8>,
    offset: usize,
    inner: S,
}

impl<S> PrefixedStream<S> {
    pub fn new(prefix: Vec<u8>, inner: S) -> Self {
        Self { prefix, offset: 0, inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for PrefixedStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.offset < self.prefix.len() {
            let remaining = &self.prefix[self.offset..];
            let to_copy = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..to_copy]);
            self.offset = self.offset.saturating_add(to_copy);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for PrefixedStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_exactly_one_record_and_replays_it(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let mut record = vec![0x16, 0x03, 0x01, 0x00, 0x04, 1, 2, 3, 4];
        record.extend_from_slice(b"tail");
        client.write_all(&record).await?;
        drop(client);

        let hello = read_client_hello(&mut server).await?;
        // the duplex may deliver the tail in the same read
        assert!(hello.starts_with(&record[..9]));

        let mut replay = PrefixedStream::new(hello, server);
        let mut all = Vec::new();
        replay.read_to_end(&mut all).await?;
        assert_eq!(all, record);
        Ok(())
    }
}
