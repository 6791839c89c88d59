use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum IpcError {
    /// Discovery or transport connect failed; the engine is back to DISCONNECTED.
    #[error("Endpoint Unavailable Error: {message} {location}")]
    EndpointUnavailable {
        message: String,
        location: ErrorLocation,
    },

    /// A complete frame was read but its payload could not be decoded.
    #[error("Frame Decode Error: {message} {location}")]
    FrameDecode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Frame Encode Error: {message} {location}")]
    FrameEncode {
        message: String,
        location: ErrorLocation,
    },

    /// The declared payload length exceeds what the codec accepts.
    #[error("Frame Too Large Error: {message} {location}")]
    FrameTooLarge {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Request Timeout Error: {message} {location}")]
    RequestTimeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Disconnected Error: {message} {location}")]
    Disconnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl IpcError {
    /// Whether the read loop can move on to the next frame after this error.
    ///
    /// Only payload-level decode failures qualify: the frame was consumed in
    /// full, so the stream is still aligned on a header boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IpcError::FrameDecode { .. })
    }
}

impl From<IoError> for IpcError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        IpcError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for IpcError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        IpcError::FrameDecode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
