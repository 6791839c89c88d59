//! The last requested activity and its publication.

use crate::error::ipc::IpcError;
use crate::ipc::connection_state::ConnectionStateCell;
use crate::ipc::correlation::Correlator;
use crate::ipc::listener::EventListener;
use crate::ipc::message::{Message, ReadyEvent, ResponseOutcome, SetActivityRequest};

use models::Activity;

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};

/// Owns the current activity and publishes it whenever the connection is READY.
///
/// `update` while disconnected only stores; the next READY (after a future
/// `connect`) publishes what was stored. Registered right after the readiness
/// listener.
pub struct PresenceManager {
    current: Mutex<Option<Activity>>,
    state: Arc<ConnectionStateCell>,
    correlator: Arc<Correlator>,
    pid: u32,
}

impl PresenceManager {
    pub(crate) fn new(state: Arc<ConnectionStateCell>, correlator: Arc<Correlator>) -> Self {
        Self {
            current: Mutex::new(None),
            state,
            correlator,
            pid: std::process::id(),
        }
    }

    pub fn current(&self) -> Option<Activity> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Store `activity` (`None` clears) and publish it if READY.
    ///
    /// Returns the nonce of the published request, or `None` if it was only
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns the send error when READY but the request could not be queued.
    /// The activity stays stored and is re-sent on the next READY.
    pub fn update(&self, activity: Option<Activity>) -> Result<Option<String>, IpcError> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = activity.clone();

        if !self.state.is_ready() {
            debug!("Not ready, activity stored for the next READY");
            return Ok(None);
        }

        self.publish(activity).map(Some)
    }

    fn publish(&self, activity: Option<Activity>) -> Result<String, IpcError> {
        let clearing = activity.is_none();
        let request = SetActivityRequest::new(self.pid, activity);

        self.correlator.send_request(
            Message::from(request),
            Box::new(move |result| match result {
                Ok(Message::SetActivityResponse(response)) => match response.outcome {
                    ResponseOutcome::Success(_) if clearing => info!("Activity cleared"),
                    ResponseOutcome::Success(_) => info!("Activity published"),
                    ResponseOutcome::Error(error) => warn!(
                        "Companion rejected activity: {} (code {})",
                        error.message, error.code
                    ),
                },
                Ok(other) => warn!("Unexpected reply to SET_ACTIVITY: {:?}", other.command()),
                Err(e) => warn!("Activity was not acknowledged: {e}"),
            }),
        )
    }
}

impl EventListener for PresenceManager {
    fn on_ready(&self, _event: &ReadyEvent) {
        let Some(activity) = self.current() else {
            debug!("READY with no stored activity, nothing to publish");
            return;
        };

        if let Err(e) = self.publish(Some(activity)) {
            warn!("Failed to publish stored activity: {e}");
        }
    }
}
