use common::ErrorLocation;

use std::any::Any;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ListenerError {
    #[error("Listener Panic Error: listener #{index} panicked: {message} {location}")]
    Panicked {
        index: usize,
        message: String,
        location: ErrorLocation,
    },
}

impl ListenerError {
    /// Build from the payload returned by `catch_unwind`.
    #[track_caller]
    pub fn from_panic(index: usize, payload: &(dyn Any + Send)) -> Self {
        ListenerError::Panicked {
            index,
            message: panic_message(payload),
            location: ErrorLocation::caller(),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
