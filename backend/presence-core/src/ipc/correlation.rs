//! Request/response correlation.
//!
//! A correlated request is registered under its nonce before its bytes are
//! queued, so a response can never arrive ahead of its entry. Each entry is
//! removed exactly once: by the matching response, by the timeout sweeper,
//! or when the connection goes away. Whoever removes it invokes the
//! continuation.

use crate::error::ipc::IpcError;
use crate::error::listener::panic_message;
use crate::ipc::codec;
use crate::ipc::message::Message;
use crate::ipc::packet::Packet;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, Location, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// How often pending requests are checked against their deadline.
pub(crate) const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Invoked once with the matching response or the reason none will arrive.
pub type Continuation = Box<dyn FnOnce(Result<Message, IpcError>) + Send + 'static>;

struct PendingEntry {
    continuation: Continuation,
    deadline: Instant,
}

/// Outstanding correlated requests keyed by nonce.
#[derive(Default)]
pub(crate) struct PendingRequests {
    entries: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingRequests {
    /// Returns the continuation back if `id` is already pending.
    fn insert(
        &self,
        id: String,
        continuation: Continuation,
        deadline: Instant,
    ) -> Result<(), Continuation> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&id) {
            return Err(continuation);
        }
        entries.insert(
            id,
            PendingEntry {
                continuation,
                deadline,
            },
        );
        Ok(())
    }

    fn take(&self, id: &str) -> Option<Continuation> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(|entry| entry.continuation)
    }

    fn take_expired(&self, now: Instant) -> Vec<(String, Continuation)> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| entries.remove(&id).map(|entry| (id, entry.continuation)))
            .collect()
    }

    fn drain(&self) -> Vec<(String, Continuation)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(id, entry)| (id, entry.continuation))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// The send path shared by callers, listeners and the read loop.
///
/// Encoded frames are pushed onto the writer task's queue, so concurrent
/// senders never interleave bytes and never block on the socket.
pub struct Correlator {
    pending: PendingRequests,
    outbound: Mutex<Option<UnboundedSender<Vec<u8>>>>,
    request_timeout: Duration,
}

impl Correlator {
    pub(crate) fn new(request_timeout: Duration) -> Self {
        Self {
            pending: PendingRequests::default(),
            outbound: Mutex::new(None),
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Route outgoing frames to a new connection's writer.
    pub(crate) fn attach(&self, sender: UnboundedSender<Vec<u8>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    pub(crate) fn detach(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[track_caller]
    fn push(&self, bytes: Vec<u8>) -> Result<(), IpcError> {
        let guard = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(IpcError::NotConnected {
                message: "No active connection".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        sender.send(bytes).map_err(|_| IpcError::Send {
            message: "Writer task has stopped".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Queue any packet without correlation (handshake replies, pongs).
    #[track_caller]
    pub fn send_packet(&self, packet: &Packet) -> Result<(), IpcError> {
        let bytes = codec::encode(packet)?;
        self.push(bytes)
    }

    /// Send `message` and invoke `continuation` with its response.
    ///
    /// A nonce is generated when the message has none. Returns the nonce the
    /// request was registered under.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Validation`] if the nonce is already pending.
    /// - [`IpcError::FrameEncode`] / [`IpcError::FrameTooLarge`] if encoding fails.
    /// - [`IpcError::NotConnected`] / [`IpcError::Send`] if there is no live writer.
    ///
    /// On error nothing stays registered and `continuation` is dropped uncalled.
    #[track_caller]
    pub fn send_request(
        &self,
        mut message: Message,
        continuation: Continuation,
    ) -> Result<String, IpcError> {
        let id = match message.correlation_id() {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                message.set_correlation_id(id.clone());
                id
            }
        };

        // Dispatch messages never report their nonce, so they cannot be matched.
        if message.correlation_id().is_none() {
            return Err(IpcError::Validation {
                message: format!(
                    "{} messages cannot be correlated",
                    message.command().unwrap_or("Unnamed")
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let bytes = codec::encode(&Packet::Message(message))?;

        let deadline = Instant::now() + self.request_timeout;
        if self.pending.insert(id.clone(), continuation, deadline).is_err() {
            return Err(IpcError::Validation {
                message: format!("Request {id} is already pending"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Err(e) = self.push(bytes) {
            self.pending.take(&id);
            return Err(e);
        }

        debug!("Sent request {id}");
        Ok(id)
    }

    /// Send a message that expects no reply.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Validation`] if the message carries a nonce;
    /// otherwise the same errors as [`Correlator::send_request`].
    #[track_caller]
    pub fn send_fire_and_forget(&self, message: Message) -> Result<(), IpcError> {
        if let Some(id) = message.correlation_id() {
            return Err(IpcError::Validation {
                message: format!("Fire-and-forget messages must not carry a nonce (got {id})"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.send_packet(&Packet::Message(message))
    }

    /// Hand `message` to its pending continuation.
    ///
    /// Returns the message back when nothing is waiting for it, in which
    /// case it is a notification.
    pub(crate) fn resolve(&self, message: Message) -> Option<Message> {
        let continuation = match message.correlation_id() {
            Some(id) => self.pending.take(id),
            None => None,
        };

        match continuation {
            Some(continuation) => {
                let id = message.correlation_id().unwrap_or_default().to_string();
                debug!("Resolved request {id}");
                invoke(&id, continuation, Ok(message));
                None
            }
            None => Some(message),
        }
    }

    /// Fail every request whose deadline has passed. Returns how many expired.
    pub(crate) fn evict_expired(&self, now: Instant) -> usize {
        let expired = self.pending.take_expired(now);
        let count = expired.len();

        for (id, continuation) in expired {
            warn!("Request {id} timed out after {:?}", self.request_timeout);
            invoke(
                &id,
                continuation,
                Err(IpcError::RequestTimeout {
                    message: format!("No response to {id} within {:?}", self.request_timeout),
                    location: ErrorLocation::from(Location::caller()),
                }),
            );
        }

        count
    }

    /// Fail every pending request; no response can arrive any more.
    pub(crate) fn fail_all(&self, reason: &str) {
        for (id, continuation) in self.pending.drain() {
            debug!("Failing request {id}: {reason}");
            invoke(
                &id,
                continuation,
                Err(IpcError::Disconnected {
                    message: format!("{reason} before a response to {id} arrived"),
                    location: ErrorLocation::from(Location::caller()),
                }),
            );
        }
    }
}

fn invoke(id: &str, continuation: Continuation, result: Result<Message, IpcError>) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || continuation(result))) {
        error!(
            "Continuation for request {id} panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// Periodically evict timed-out requests until cancelled.
pub(crate) async fn run_sweeper(correlator: Arc<Correlator>, mut cancel: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = ticker.tick() => {
                let evicted = correlator.evict_expired(Instant::now());
                if evicted > 0 {
                    debug!("Evicted {evicted} timed-out requests");
                }
                // Detached means the read loop already failed what was pending.
                if !correlator.is_attached() {
                    break;
                }
            }
        }
    }
}
