//! Byte-channel transport to the companion process.
//!
//! The engine never touches sockets directly. A [`Connector`] turns an
//! endpoint path into a [`Channel`]: an owned read half consumed by the read
//! loop and an owned write half consumed by the writer task.

mod local;

pub use local::LocalSocketConnector;

use std::io;
use std::path::Path;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open duplex connection, already split into halves.
pub struct Channel {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Channel {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Split a single duplex stream (e.g. `tokio::io::DuplexStream`).
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

/// Opens a [`Channel`] to a resolved endpoint.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, endpoint: &'a Path) -> BoxFuture<'a, io::Result<Channel>>;
}
