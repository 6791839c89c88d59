//! Keeping a client connected for the lifetime of the application.
//!
//! The engine never reconnects by itself. This module retries `connect`
//! with exponential backoff and watches for the connection going away.

use crate::error::PresenceAppError;

use common::ErrorLocation;
use models::{Activity, ActivityAssets, ActivityTimestamps, ModelError};
use presence_core::ipc::{CloseFrame, ErrorPayload, EventListener, ReadyEvent};
use presence_core::PresenceClient;

use std::future::Future;
use std::panic::Location;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use serde_json::Value;
use tokio::time::sleep as TokioSleep;

/// How long `connect_with_backoff` keeps retrying before giving up.
pub const CONNECT_MAX_ELAPSED: Duration = Duration::from_secs(60);

/// How often the supervisor checks whether the connection is still there.
pub const SUPERVISE_INTERVAL: Duration = Duration::from_secs(5);

/// Connect, retrying with exponential backoff until `max_elapsed`.
///
/// # Errors
///
/// Returns [`PresenceAppError::ConnectFailed`] with the last connect error
/// once the backoff is exhausted.
pub async fn connect_with_backoff(
    client: &PresenceClient,
    max_elapsed: Duration,
) -> Result<(), PresenceAppError> {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(250),
        max_interval: Duration::from_secs(10),
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    debug!("Connecting as client {}", client.client_id());

    loop {
        let last_error = match client.connect().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        match backoff.next_backoff() {
            Some(duration) => {
                trace!("Companion not reachable, retrying after {duration:?}");
                TokioSleep(duration).await;
            }
            None => {
                return Err(PresenceAppError::ConnectFailed {
                    message: format!("Gave up after {max_elapsed:?}: {last_error}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }
}

/// Reconnect whenever the connection drops, until `shutdown` resolves.
///
/// The stored activity is republished by the client on every READY, so
/// nothing needs to be resent here.
pub async fn supervise<S>(client: &PresenceClient, interval: Duration, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if client.is_connected() {
                    continue;
                }
                info!("Connection lost, reconnecting");
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    result = connect_with_backoff(client, CONNECT_MAX_ELAPSED) => {
                        if let Err(e) = result {
                            warn!("{e}");
                        }
                    }
                }
            }
        }
    }
}

/// The activity shown by the demo: what is being worked on, since when.
pub fn sample_activity(project: &str) -> Result<Activity, ModelError> {
    let assets = ActivityAssets::builder()
        .with_large_image("logo")
        .with_large_text("presence")
        .build()?;

    Activity::builder()
        .with_details(format!("Working on {project}"))
        .with_state("Idle")
        .with_timestamps(ActivityTimestamps::from_now())
        .with_assets(assets)
        .build()
}

/// Logs what the companion reports.
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_ready(&self, event: &ReadyEvent) {
        let user = event
            .user
            .as_ref()
            .and_then(|user| user.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("unknown user");
        let environment = event.config.environment.as_deref().unwrap_or("unknown");
        info!(
            "Companion ready (protocol v{}, environment {environment}) for {user}",
            event.version
        );
    }

    fn on_error(&self, error: &ErrorPayload) {
        warn!("Companion reported error {}: {}", error.code, error.message);
    }

    fn on_unknown_event(&self, name: &str, _data: &Value) {
        debug!("Unhandled event {name}");
    }

    fn on_close(&self, close: &CloseFrame) {
        warn!("Companion closed the connection: {} ({})", close.message, close.code);
    }
}

/// Error helper for `main`.
#[track_caller]
pub fn app_error(message: impl Into<String>) -> PresenceAppError {
    PresenceAppError::App {
        message: message.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}
