use common::ErrorLocation;
use presence_core::{CoreError, IpcError};

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the presence application.
///
/// Library errors are flattened to their message so the whole enum stays
/// serializable for the status line.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum PresenceAppError {
    /// Error from this App
    #[error("Presence Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from presence-core (config, discovery, engine)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// Gave up reaching the companion
    #[error("Connect Error: {message} {location}")]
    ConnectFailed {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for PresenceAppError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        PresenceAppError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IpcError> for PresenceAppError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        PresenceAppError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
