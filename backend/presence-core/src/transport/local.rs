use crate::transport::{Channel, Connector};

use std::io;
use std::path::Path;

use futures_util::future::BoxFuture;
use log::debug;

/// Connects to the platform's local IPC primitive: a Unix domain socket on
/// Unix, a named pipe on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSocketConnector;

impl Connector for LocalSocketConnector {
    fn connect<'a>(&'a self, endpoint: &'a Path) -> BoxFuture<'a, io::Result<Channel>> {
        Box::pin(async move {
            debug!("Opening local socket {}", endpoint.display());
            open(endpoint).await
        })
    }
}

#[cfg(unix)]
async fn open(endpoint: &Path) -> io::Result<Channel> {
    let stream = tokio::net::UnixStream::connect(endpoint).await?;
    let (reader, writer) = stream.into_split();
    Ok(Channel::new(reader, writer))
}

#[cfg(windows)]
async fn open(endpoint: &Path) -> io::Result<Channel> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(endpoint)?;
    Ok(Channel::from_stream(pipe))
}

#[cfg(not(any(unix, windows)))]
async fn open(endpoint: &Path) -> io::Result<Channel> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!(
            "local sockets are not supported on this platform ({})",
            endpoint.display()
        ),
    ))
}
