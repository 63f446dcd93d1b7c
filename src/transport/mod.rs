//! Transport module - where connections come from.
//!
//! The connection manager only needs a source of accepted byte streams.
//! [`Acceptor`] abstracts over:
//! - TCP listeners
//! - Unix Domain Sockets (Linux/macOS), see [`UnixSocketListener`]

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::UnixSocketListener;

/// A listener that yields accepted streams.
///
/// `accept` must be cancel safe: the accept loop races it against shutdown.
pub trait Acceptor: Send + 'static {
    /// Accepted stream type.
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Wait for the next connection.
    fn accept(&mut self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<TcpStream> {
        let (stream, _addr) = TcpListener::accept(self).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
