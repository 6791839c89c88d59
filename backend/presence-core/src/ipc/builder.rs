use crate::config::ClientConfig;
use crate::discovery::{EndpointResolver, SocketDiscovery};
use crate::error::CoreError;
use crate::ipc::client::PresenceClient;
use crate::ipc::correlation::Correlator;
use crate::ipc::listener::EventListener;
use crate::transport::{Connector, LocalSocketConnector};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`PresenceClient`].
///
/// Defaults: socket discovery over the platform's well-known locations, the
/// local socket connector, and the configured request timeout.
pub struct PresenceClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    resolver: Option<Arc<dyn EndpointResolver>>,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl PresenceClientBuilder {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(client_id))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
            resolver: None,
            listeners: Vec::new(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_socket_index(mut self, index: u8) -> Self {
        self.config.socket_index = Some(index);
        self
    }

    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.runtime_dir = Some(dir.into());
        self
    }

    /// Replace the transport, e.g. with an in-memory one in tests.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace discovery. Socket index and runtime dir are then ignored.
    pub fn with_endpoint_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Listeners run after the client's own, in the order added here.
    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Build the client with validation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if the client id, socket index or timeout
    /// is invalid.
    #[track_caller]
    pub fn build(self) -> Result<PresenceClient, CoreError> {
        self.config.validate()?;

        let resolver: Arc<dyn EndpointResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => {
                let mut discovery = SocketDiscovery::new();
                if let Some(index) = self.config.socket_index {
                    discovery = discovery.with_socket_index(index)?;
                }
                if let Some(dir) = self.config.runtime_dir.clone() {
                    discovery = discovery.with_runtime_dir(dir);
                }
                Arc::new(discovery)
            }
        };

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(LocalSocketConnector),
        };

        Ok(PresenceClient::from_parts(
            self.config.client_id.clone(),
            connector,
            resolver,
            Correlator::new(self.config.request_timeout()),
            self.listeners,
        ))
    }
}
