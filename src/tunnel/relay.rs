//! Per-connection relay

use super::TargetDescriptor;
use crate::dialer::{BoxedStream, Dialer};
use crate::metrics::{counters, gauges::ActiveRelay, histograms, labels};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Dial `target` and copy bytes between it and `local` until both sides finish
///
/// Dial failures close `local` and are only logged; copy errors end their
/// direction like EOF.
pub(crate) async fn relay<S>(
    local: S,
    peer: SocketAddr,
    target: &TargetDescriptor,
    dialer: &dyn Dialer,
    dial_timeout: Option<Duration>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let remote = match dial(target, dialer, dial_timeout).await {
        Ok(remote) => remote,
        Err((reason, e)) => {
            tracing::warn!(%peer, %target, error = %e, "dial failed, closing client connection");
            counters::tunnel_dial_failed(reason);
            return;
        }
    };

    let _active = ActiveRelay::start();
    tracing::debug!(%peer, %target, "relay started");

    let (mut local_read, mut local_write) = tokio::io::split(local);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let (upstream, downstream) = tokio::join!(
        copy_half(&mut local_read, &mut remote_write, labels::DIRECTION_UPSTREAM),
        copy_half(&mut remote_read, &mut local_write, labels::DIRECTION_DOWNSTREAM),
    );

    counters::tunnel_relay_completed();
    tracing::debug!(upstream, downstream, "relay finished");
}

async fn dial(
    target: &TargetDescriptor,
    dialer: &dyn Dialer,
    dial_timeout: Option<Duration>,
) -> Result<BoxedStream, (&'static str, io::Error)> {
    let addr = target.addr();
    let started = Instant::now();

    let result = match dial_timeout {
        Some(limit) => match tokio::time::timeout(limit, dialer.dial(&addr)).await {
            Ok(result) => result,
            Err(_) => {
                return Err((
                    labels::REASON_TIMEOUT,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("dial timed out after {:?}", limit),
                    ),
                ))
            }
        },
        None => dialer.dial(&addr).await,
    };

    let stream = result.map_err(|e| (labels::REASON_ERROR, e))?;
    histograms::tunnel_dial_duration(started.elapsed().as_millis() as u64);
    Ok(stream)
}

/// Copy one direction, then shut down the destination's write half
///
/// Returns the bytes delivered to `writer`, including those written before
/// a copy error.
async fn copy_half<R, W>(reader: &mut R, writer: &mut W, direction: &'static str) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut counted = CountingWriter::new(writer);
    if let Err(e) = tokio::io::copy(reader, &mut counted).await {
        tracing::debug!(direction, error = %e, "copy ended with error");
    }
    let copied = counted.written;

    if let Err(e) = writer.shutdown().await {
        tracing::trace!(direction, error = %e, "shutdown after copy failed");
    }
    histograms::tunnel_relay_bytes(direction, copied);
    copied
}

/// Writer that tallies accepted bytes
struct CountingWriter<'a, W> {
    inner: &'a mut W,
    written: u64,
}

impl<'a, W> CountingWriter<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for CountingWriter<'_, W> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut *self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.written += n as u64;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use tokio::io::{duplex, AsyncReadExt};

    /// Dialer whose remote end echoes everything back
    struct EchoDialer;

    impl Dialer for EchoDialer {
        fn dial<'a>(&'a self, _: &'a str) -> BoxFuture<'a, io::Result<BoxedStream>> {
            Box::pin(async {
                let (ours, mut theirs) = duplex(1024);
                tokio::spawn(async move {
                    let (mut r, mut w) = tokio::io::split(&mut theirs);
                    let _ = tokio::io::copy(&mut r, &mut w).await;
                });
                Ok(Box::new(ours) as BoxedStream)
            })
        }
    }

    struct FailingDialer;

    impl Dialer for FailingDialer {
        fn dial<'a>(&'a self, _: &'a str) -> BoxFuture<'a, io::Result<BoxedStream>> {
            Box::pin(async { Err(io::Error::from(io::ErrorKind::ConnectionRefused)) })
        }
    }

    struct StalledDialer;

    impl Dialer for StalledDialer {
        fn dial<'a>(&'a self, _: &'a str) -> BoxFuture<'a, io::Result<BoxedStream>> {
            Box::pin(futures::future::pending())
        }
    }

    fn target() -> TargetDescriptor {
        TargetDescriptor::new("db.internal", 5432)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_relay_round_trip() {
        let (client, local) = duplex(1024);
        let relay_task =
            tokio::spawn(async move { relay(local, peer(), &target(), &EchoDialer, None).await });

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"SELECT 1").await.unwrap();
        client_write.shutdown().await.unwrap();

        let mut echoed = Vec::new();
        client_read.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"SELECT 1");

        relay_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_failure_closes_local() {
        let (mut client, local) = duplex(64);
        relay(local, peer(), &target(), &FailingDialer, None).await;

        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dial_timeout_closes_local() {
        let (mut client, local) = duplex(64);
        relay(
            local,
            peer(),
            &target(),
            &StalledDialer,
            Some(Duration::from_millis(20)),
        )
        .await;

        let mut buf = Vec::new();
        assert_eq!(client.read_to_end(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_copy_half_counts_and_shuts_down() {
        let mut reader: &[u8] = b"0123456789";
        let (mut writer, mut sink) = duplex(64);

        let copied = copy_half(&mut reader, &mut writer, labels::DIRECTION_UPSTREAM).await;
        assert_eq!(copied, 10);

        let mut out = Vec::new();
        sink.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0123456789");
    }

    #[tokio::test]
    async fn test_copy_half_counts_bytes_before_error() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"0123")
            .read(b"456")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let (mut writer, mut sink) = duplex(64);

        let copied = copy_half(&mut reader, &mut writer, labels::DIRECTION_DOWNSTREAM).await;
        assert_eq!(copied, 7);

        let mut out = Vec::new();
        sink.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"0123456");
    }
}
