//! Notification fan-out.
//!
//! Listeners run synchronously on the read loop, in registration order. A
//! panicking listener is logged and skipped; the remaining listeners and the
//! read loop carry on.

use crate::error::listener::ListenerError;
use crate::ipc::message::{DispatchEvent, ErrorPayload, Message, ReadyEvent};
use crate::ipc::packet::CloseFrame;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use log::{error, trace};
use serde_json::Value;

/// Something the read loop delivers to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A decoded message no pending request was waiting for.
    Message(Message),
    /// The companion sent CLOSE; end-of-stream follows.
    Closed(CloseFrame),
}

/// Receives notifications from the companion.
///
/// Implement the specific `on_*` hooks you care about; the default
/// [`EventListener::on_notification`] routes each notification to them.
/// Hooks run on the read loop and must not block.
pub trait EventListener: Send + Sync {
    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::Message(Message::Dispatch(dispatch)) => match &dispatch.event {
                DispatchEvent::Ready(ready) => self.on_ready(ready),
                DispatchEvent::Error(error) => self.on_error(error),
                DispatchEvent::Unknown { name, data } => self.on_unknown_event(name, data),
            },
            Notification::Message(message) => self.on_message(message),
            Notification::Closed(close) => self.on_close(close),
        }
    }

    fn on_ready(&self, _event: &ReadyEvent) {}

    fn on_error(&self, _error: &ErrorPayload) {}

    fn on_unknown_event(&self, _name: &str, _data: &Value) {}

    /// Any non-dispatch message that was not a correlated response.
    fn on_message(&self, _message: &Message) {}

    fn on_close(&self, _close: &CloseFrame) {}
}

/// Adapts a closure into an [`EventListener`] that sees every notification.
pub struct FnListener<F>(F);

impl<F> EventListener for FnListener<F>
where
    F: Fn(&Notification) + Send + Sync,
{
    fn on_notification(&self, notification: &Notification) {
        (self.0)(notification)
    }
}

pub fn listener_fn<F>(handler: F) -> Arc<dyn EventListener>
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    Arc::new(FnListener(handler))
}

/// Ordered, append-only set of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener in order. Returns the failures, which have
    /// already been logged.
    pub fn dispatch(&self, notification: &Notification) -> Vec<ListenerError> {
        // Snapshot so listeners may register others without deadlocking.
        let snapshot: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        trace!("Dispatching to {} listeners", snapshot.len());

        let mut failures = Vec::new();
        for (index, listener) in snapshot.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_notification(notification)));
            if let Err(payload) = outcome {
                let failure = ListenerError::from_panic(index, payload.as_ref());
                error!("{failure}");
                failures.push(failure);
            }
        }
        failures
    }
}
