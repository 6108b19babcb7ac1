use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use roster_pool::Socket;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

/// Opens sockets for a [`SocketSet`](crate::SocketSet).
///
/// The host is an opaque `host:port` string straight from the watcher; the
/// connector is expected to resolve it and enforce the supplied connect
/// timeout itself.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Socket: Socket;

    async fn connect(&self, host: &str, timeout: Duration) -> io::Result<Self::Socket>;
}

/// The default connector: plain TCP via tokio.
#[derive(Debug, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Socket = TcpSocket;

    async fn connect(&self, host: &str, timeout: Duration) -> io::Result<TcpSocket> {
        match tokio::time::timeout(timeout, TcpStream::connect(host)).await {
            Ok(stream) => Ok(TcpSocket { stream: stream? }),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connecting to {host} timed out"),
            )),
        }
    }
}

/// A pooled TCP connection. Implements `AsyncRead`/`AsyncWrite` by
/// forwarding to the inner stream.
#[derive(Debug)]
pub struct TcpSocket {
    stream: TcpStream,
}

impl TcpSocket {
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[async_trait]
impl Socket for TcpSocket {
    async fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

impl AsyncRead for TcpSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }
}
