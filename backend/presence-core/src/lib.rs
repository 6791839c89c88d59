//! Client for the local rich-presence IPC protocol.
//!
//! Discovers the companion process's endpoint, performs the versioned
//! handshake, exchanges length-prefixed JSON frames, and keeps the
//! application's activity published across reconnects.
//!
//! See [`PresenceClient`] for the lifecycle.

pub mod config;
pub mod discovery;
pub mod error;
pub mod ipc;
pub mod transport;


pub use config::ClientConfig;
pub use error::CoreError;
pub use error::ipc::IpcError;
pub use ipc::{ConnectionState, EventListener, Notification, PresenceClient, PresenceClientBuilder};

/// Handshake protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Endpoint names are this prefix followed by a digit 0-9.
pub const ENDPOINT_PREFIX: &str = "discord-ipc-";
