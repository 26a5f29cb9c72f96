//! Outbound dialers
//!
//! A [`Dialer`] opens a byte stream to `host:port`, possibly through an
//! intermediary. The tunnel calls it once per accepted local connection.

mod socks;

pub use socks::Socks5Dialer;

use futures::future::BoxFuture;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A bidirectional byte stream returned by a dialer
pub trait TunnelStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> TunnelStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Type-erased stream
pub type BoxedStream = Box<dyn TunnelStream>;

/// Capability to establish outbound connections
///
/// Implementations should be cheap to call concurrently; the tunnel shares a
/// single dialer across all relays.
pub trait Dialer: Send + Sync {
    /// Connect to `addr` (`host:port`, IPv6 hosts bracketed)
    fn dial<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, io::Result<BoxedStream>>;
}

/// Plain TCP dialer
#[derive(Debug, Clone)]
pub struct DirectDialer {
    nodelay: bool,
}

impl DirectDialer {
    /// Dialer with `TCP_NODELAY` enabled
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Set `TCP_NODELAY` on dialed sockets
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for DirectDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialer for DirectDialer {
    fn dial<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, io::Result<BoxedStream>> {
        Box::pin(async move {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(self.nodelay)?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_direct_dialer_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut stream = DirectDialer::new().dial(&addr).await.unwrap();
        stream.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_direct_dialer_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(DirectDialer::new().dial(&addr).await.is_err());
    }
}
