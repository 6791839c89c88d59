//! The engine: one logical connection to the companion process.

use crate::discovery::EndpointResolver;
use crate::error::ipc::IpcError;
use crate::ipc::builder::PresenceClientBuilder;
use crate::ipc::connection_state::{ConnectionState, ConnectionStateCell, ReadinessListener};
use crate::ipc::correlation::{Correlator, run_sweeper};
use crate::ipc::handle::ConnectionHandle;
use crate::ipc::listener::{EventListener, ListenerRegistry};
use crate::ipc::message::Message;
use crate::ipc::presence::PresenceManager;
use crate::ipc::read_loop::{self, LoopContext};
use crate::ipc::writer;
use crate::transport::{Channel, Connector};

use common::ErrorLocation;
use models::Activity;

use std::panic::Location;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{Mutex, mpsc, oneshot, watch};

/// Client for the companion's local IPC endpoint.
///
/// # Lifecycle
///
/// 1. Build with [`PresenceClient::builder`] and register listeners.
/// 2. [`connect`](PresenceClient::connect) resolves the endpoint, opens it,
///    starts the read loop and writes the handshake.
/// 3. The companion answers with a READY dispatch; the state becomes
///    [`ConnectionState::Ready`] and any stored activity is published.
/// 4. If the companion goes away the state returns to
///    [`ConnectionState::Disconnected`]. Nothing reconnects automatically;
///    call `connect` again.
///
/// # Examples
///
/// ```no_run
/// use models::{Activity, ActivityTimestamps};
/// use presence_core::PresenceClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = PresenceClient::builder("1234567890").build()?;
///
///     let activity = Activity::builder()
///         .with_details("Editing main.rs")
///         .with_timestamps(ActivityTimestamps::from_now())
///         .build()?;
///     client.update_activity(Some(activity))?;
///
///     client.connect().await?;
///     Ok(())
/// }
/// ```
pub struct PresenceClient {
    client_id: String,
    connector: Arc<dyn Connector>,
    resolver: Arc<dyn EndpointResolver>,
    state: Arc<ConnectionStateCell>,
    correlator: Arc<Correlator>,
    listeners: Arc<ListenerRegistry>,
    presence: Arc<PresenceManager>,
    connection: Mutex<Option<ConnectionHandle>>,
}

impl PresenceClient {
    pub fn builder(client_id: impl Into<String>) -> PresenceClientBuilder {
        PresenceClientBuilder::new(client_id)
    }

    pub(crate) fn from_parts(
        client_id: String,
        connector: Arc<dyn Connector>,
        resolver: Arc<dyn EndpointResolver>,
        correlator: Correlator,
        listeners: Vec<Arc<dyn EventListener>>,
    ) -> Self {
        let state = Arc::new(ConnectionStateCell::new());
        let correlator = Arc::new(correlator);
        let presence = Arc::new(PresenceManager::new(state.clone(), correlator.clone()));

        let registry = ListenerRegistry::new();
        registry.register(Arc::new(ReadinessListener::new(state.clone())));
        registry.register(presence.clone());
        for listener in listeners {
            registry.register(listener);
        }

        Self {
            client_id,
            connector,
            resolver,
            state,
            correlator,
            listeners: Arc::new(registry),
            presence,
            connection: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// True while a connection is open (CONNECTING or READY).
    pub fn is_connected(&self) -> bool {
        self.state.get() != ConnectionState::Disconnected
    }

    /// Open a connection and write the handshake.
    ///
    /// Any existing connection is shut down first; its pending requests fail
    /// with [`IpcError::Disconnected`]. Returns once the handshake is written;
    /// READY arrives later through the listeners.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::EndpointUnavailable`] if discovery, the transport
    /// connect or the handshake write fails. The state is DISCONNECTED again.
    pub async fn connect(&self) -> Result<(), IpcError> {
        let mut connection = self.connection.lock().await;

        if let Some(previous) = connection.take() {
            info!("Replacing existing connection");
            previous.shutdown().await;
        }
        self.correlator.detach();
        self.correlator.fail_all("Connection replaced");

        self.state.set(ConnectionState::Connecting);

        let endpoint = match self.resolver.resolve_endpoint_path() {
            Ok(endpoint) => endpoint,
            Err(e) => return Err(self.unavailable(format!("Endpoint discovery failed: {e}"))),
        };

        let Channel { reader, mut writer } = match self.connector.connect(&endpoint).await {
            Ok(channel) => channel,
            Err(e) => {
                return Err(self.unavailable(format!(
                    "Failed to connect to {}: {e}",
                    endpoint.display()
                )));
            }
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.correlator.attach(outbound_tx);

        let context = LoopContext {
            state: self.state.clone(),
            correlator: self.correlator.clone(),
            listeners: self.listeners.clone(),
        };
        let read_loop = tokio::spawn(read_loop::run(reader, context, cancel_rx.clone()));

        if let Err(e) = writer::write_handshake(&mut writer, &self.client_id).await {
            cancel_tx.send_replace(true);
            if let Err(join) = read_loop.await {
                warn!("Read loop ended abnormally: {join}");
            }
            self.correlator.detach();
            self.correlator.fail_all("Handshake failed");
            return Err(self.unavailable(format!("Handshake failed: {e}")));
        }

        let writer = tokio::spawn(writer::run(writer, outbound_rx, cancel_rx.clone()));
        let sweeper = tokio::spawn(run_sweeper(self.correlator.clone(), cancel_rx));

        *connection = Some(ConnectionHandle::new(cancel_tx, read_loop, writer, sweeper));
        info!(
            "Handshake sent to {} as client {}",
            endpoint.display(),
            self.client_id
        );
        Ok(())
    }

    #[track_caller]
    fn unavailable(&self, message: String) -> IpcError {
        self.state.set(ConnectionState::Disconnected);
        warn!("{message}");
        IpcError::EndpointUnavailable {
            message,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Stop the connection's tasks and wait for them.
    ///
    /// Pending requests fail with [`IpcError::Disconnected`]. The stored
    /// activity is kept for the next `connect`.
    pub async fn shutdown(&self) {
        let mut connection = self.connection.lock().await;
        if let Some(handle) = connection.take() {
            handle.shutdown().await;
        }
        self.correlator.detach();
        self.correlator.fail_all("Client shut down");
        self.state.set(ConnectionState::Disconnected);
        info!("Presence client shut down");
    }

    /// Store an activity (`None` clears it) and publish it if READY.
    ///
    /// Returns the request nonce when it was sent.
    pub fn update_activity(&self, activity: Option<Activity>) -> Result<Option<String>, IpcError> {
        self.presence.update(activity)
    }

    pub fn current_activity(&self) -> Option<Activity> {
        self.presence.current()
    }

    /// Append a listener. Register before `connect` to see READY.
    pub fn register_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.register(listener);
    }

    /// Send a correlated request; `continuation` receives exactly one
    /// outcome: the response, a timeout, or a disconnect.
    pub fn send_request<F>(&self, message: Message, continuation: F) -> Result<String, IpcError>
    where
        F: FnOnce(Result<Message, IpcError>) + Send + 'static,
    {
        self.correlator.send_request(message, Box::new(continuation))
    }

    /// Send a correlated request and wait for its response.
    pub async fn request(&self, message: Message) -> Result<Message, IpcError> {
        let (sender, receiver) = oneshot::channel();
        self.correlator.send_request(
            message,
            Box::new(move |result| {
                // The caller may have stopped waiting.
                let _ = sender.send(result);
            }),
        )?;

        receiver.await.map_err(|_| IpcError::Disconnected {
            message: "Request was dropped without a response".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?
    }

    pub fn send_fire_and_forget(&self, message: Message) -> Result<(), IpcError> {
        self.correlator.send_fire_and_forget(message)
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }
}

impl Drop for PresenceClient {
    fn drop(&mut self) {
        // Dropping the handle signals cancellation to its tasks.
        if let Ok(mut connection) = self.connection.try_lock() {
            connection.take();
        }
        self.correlator.detach();
        self.correlator.fail_all("Client dropped");
    }
}
