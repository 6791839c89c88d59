//! Endpoint discovery for the companion process.
//!
//! The companion binds one of ten local endpoints named `discord-ipc-0`
//! through `discord-ipc-9`. On Unix these are domain sockets inside a runtime
//! or temp directory; on Windows they are named pipes.
//!
//! The engine only consumes the [`EndpointResolver`] trait, so tests and
//! embedders can supply a fixed path with [`StaticEndpoint`].

pub mod endpoint;

pub use endpoint::{SocketDiscovery, StaticEndpoint};

use crate::error::discovery::DiscoveryError;

use std::path::PathBuf;

/// Resolves the filesystem path (or pipe name) of the companion endpoint.
pub trait EndpointResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] when no endpoint exists.
    fn resolve_endpoint_path(&self) -> Result<PathBuf, DiscoveryError>;
}
