//! Connection readiness tracking.
//!
//! One [`ConnectionStateCell`] exists per client. `connect` moves it to
//! CONNECTING, the readiness listener moves it to READY, and the read loop
//! (or an explicit shutdown) moves it back to DISCONNECTED. Readers may see a
//! stale value; nothing relies on more than atomic visibility.

use crate::ipc::listener::EventListener;
use crate::ipc::message::ReadyEvent;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Ready => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Ready,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Ready => "READY",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct ConnectionStateCell {
    value: AtomicU8,
}

impl Default for ConnectionStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateCell {
    pub fn new() -> Self {
        Self {
            value: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.value.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.value.store(state.as_u8(), Ordering::Release);
    }

    /// CONNECTING -> READY. Returns the state that was found if it was not
    /// CONNECTING; a stray READY after a disconnect must not resurrect the
    /// connection.
    pub(crate) fn mark_ready(&self) -> Result<(), ConnectionState> {
        self.value
            .compare_exchange(
                ConnectionState::Connecting.as_u8(),
                ConnectionState::Ready.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(ConnectionState::from_u8)
    }

    pub fn is_ready(&self) -> bool {
        self.get() == ConnectionState::Ready
    }
}

/// Flips the state to READY when the companion accepts the handshake.
///
/// Always the first registered listener, so every later listener already
/// observes READY.
pub(crate) struct ReadinessListener {
    state: Arc<ConnectionStateCell>,
}

impl ReadinessListener {
    pub(crate) fn new(state: Arc<ConnectionStateCell>) -> Self {
        Self { state }
    }
}

impl EventListener for ReadinessListener {
    fn on_ready(&self, event: &ReadyEvent) {
        match self.state.mark_ready() {
            Ok(()) => info!(
                "Companion ready (protocol v{}, environment {})",
                event.version,
                event.config.environment.as_deref().unwrap_or("unknown")
            ),
            Err(found) => warn!("Ignoring READY while {found}"),
        }
    }
}
