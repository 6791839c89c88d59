//! The payload of a FRAME packet.
//!
//! Every message is a JSON object discriminated by `cmd`. `DISPATCH`
//! messages carry a second discriminator, `evt`, naming the notification.
//! Anything this crate does not model decodes to an `Unknown` variant
//! holding the raw fields, so new commands or events from the companion never
//! abort the connection.

use crate::error::ipc::IpcError;

use common::ErrorLocation;
use models::Activity;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const COMMAND_DISPATCH: &str = "DISPATCH";
pub const COMMAND_SET_ACTIVITY: &str = "SET_ACTIVITY";

pub const EVENT_READY: &str = "READY";
pub const EVENT_ERROR: &str = "ERROR";

const FIELD_COMMAND: &str = "cmd";
const FIELD_NONCE: &str = "nonce";
const FIELD_EVENT: &str = "evt";
const FIELD_DATA: &str = "data";
const FIELD_ARGS: &str = "args";

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A notification pushed by the companion. Never correlated.
    Dispatch(Dispatch),
    SetActivityRequest(SetActivityRequest),
    SetActivityResponse(SetActivityResponse),
    Unknown(UnknownMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub nonce: Option<String>,
    pub event: DispatchEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// The handshake was accepted.
    Ready(ReadyEvent),
    Error(ErrorPayload),
    Unknown { name: String, data: Value },
}

impl DispatchEvent {
    pub fn name(&self) -> &str {
        match self {
            DispatchEvent::Ready(_) => EVENT_READY,
            DispatchEvent::Error(_) => EVENT_ERROR,
            DispatchEvent::Unknown { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadyEvent {
    #[serde(rename = "v", default)]
    pub version: u32,

    #[serde(default)]
    pub config: ReadyConfig,

    /// The signed-in user. An object when present; `null` reads as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Map<String, Value>>,
}

/// Routing configuration advertised in READY.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetActivityRequest {
    pub nonce: Option<String>,
    pub args: SetActivityArgs,
}

impl SetActivityRequest {
    /// A request without a nonce; the correlator assigns one on send.
    pub fn new(pid: u32, activity: Option<Activity>) -> Self {
        Self {
            nonce: None,
            args: SetActivityArgs { pid, activity },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetActivityArgs {
    pub pid: u32,
    /// `None` clears the activity and is sent as `null`.
    pub activity: Option<Activity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetActivityResponse {
    pub nonce: Option<String>,
    pub outcome: ResponseOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The companion's echo of what it stored.
    Success(Value),
    Error(ErrorPayload),
}

/// A message with an unrecognized (or missing) `cmd`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownMessage {
    pub command: Option<String>,
    pub nonce: Option<String>,
    /// Every field except `cmd` and `nonce`.
    pub body: Map<String, Value>,
}

impl Message {
    pub fn command(&self) -> Option<&str> {
        match self {
            Message::Dispatch(_) => Some(COMMAND_DISPATCH),
            Message::SetActivityRequest(_) | Message::SetActivityResponse(_) => {
                Some(COMMAND_SET_ACTIVITY)
            }
            Message::Unknown(unknown) => unknown.command.as_deref(),
        }
    }

    /// The nonce used to match a response to its request.
    ///
    /// Dispatches always return `None`: they are broadcast, even when the
    /// companion fills in a nonce.
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Message::Dispatch(_) => None,
            Message::SetActivityRequest(request) => request.nonce.as_deref(),
            Message::SetActivityResponse(response) => response.nonce.as_deref(),
            Message::Unknown(unknown) => unknown.nonce.as_deref(),
        }
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        let id = Some(id.into());
        match self {
            Message::Dispatch(dispatch) => dispatch.nonce = id,
            Message::SetActivityRequest(request) => request.nonce = id,
            Message::SetActivityResponse(response) => response.nonce = id,
            Message::Unknown(unknown) => unknown.nonce = id,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();

        match self {
            Message::Dispatch(dispatch) => {
                object.insert(FIELD_COMMAND.into(), COMMAND_DISPATCH.into());
                object.insert(FIELD_NONCE.into(), nonce_value(&dispatch.nonce));
                object.insert(FIELD_EVENT.into(), dispatch.event.name().into());
                let data = match &dispatch.event {
                    DispatchEvent::Ready(ready) => to_value_or_null(ready),
                    DispatchEvent::Error(error) => to_value_or_null(error),
                    DispatchEvent::Unknown { data, .. } => data.clone(),
                };
                object.insert(FIELD_DATA.into(), data);
            }
            Message::SetActivityRequest(request) => {
                object.insert(FIELD_COMMAND.into(), COMMAND_SET_ACTIVITY.into());
                object.insert(FIELD_NONCE.into(), nonce_value(&request.nonce));
                object.insert(FIELD_ARGS.into(), to_value_or_null(&request.args));
            }
            Message::SetActivityResponse(response) => {
                object.insert(FIELD_COMMAND.into(), COMMAND_SET_ACTIVITY.into());
                object.insert(FIELD_NONCE.into(), nonce_value(&response.nonce));
                match &response.outcome {
                    ResponseOutcome::Success(data) => {
                        object.insert(FIELD_EVENT.into(), Value::Null);
                        object.insert(FIELD_DATA.into(), data.clone());
                    }
                    ResponseOutcome::Error(error) => {
                        object.insert(FIELD_EVENT.into(), EVENT_ERROR.into());
                        object.insert(FIELD_DATA.into(), to_value_or_null(error));
                    }
                }
            }
            Message::Unknown(unknown) => {
                object.extend(unknown.body.clone());
                if let Some(command) = &unknown.command {
                    object.insert(FIELD_COMMAND.into(), command.clone().into());
                }
                object.insert(FIELD_NONCE.into(), nonce_value(&unknown.nonce));
            }
        }

        Value::Object(object)
    }

    /// Decode a FRAME payload, reading the discriminators first.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::FrameDecode`] if the payload is not an object, or
    /// if a recognized command carries fields of the wrong shape.
    #[track_caller]
    pub fn from_value(value: Value) -> Result<Message, IpcError> {
        let Value::Object(mut object) = value else {
            return Err(IpcError::FrameDecode {
                message: format!("Expected a JSON object, got: {value}"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let command = take_string(&mut object, FIELD_COMMAND);
        let nonce = take_string(&mut object, FIELD_NONCE);

        let message = match command.as_deref() {
            Some(COMMAND_DISPATCH) => {
                let name = take_string(&mut object, FIELD_EVENT).unwrap_or_default();
                let data = object.remove(FIELD_DATA).unwrap_or(Value::Null);
                let event = match name.as_str() {
                    EVENT_READY => DispatchEvent::Ready(serde_json::from_value(data)?),
                    EVENT_ERROR => DispatchEvent::Error(serde_json::from_value(data)?),
                    _ => DispatchEvent::Unknown { name, data },
                };
                Message::Dispatch(Dispatch { nonce, event })
            }
            Some(COMMAND_SET_ACTIVITY) if object.contains_key(FIELD_ARGS) => {
                let args = object.remove(FIELD_ARGS).unwrap_or(Value::Null);
                Message::SetActivityRequest(SetActivityRequest {
                    nonce,
                    args: serde_json::from_value(args)?,
                })
            }
            Some(COMMAND_SET_ACTIVITY) => {
                let is_error = object.get(FIELD_EVENT).and_then(Value::as_str) == Some(EVENT_ERROR);
                let data = object.remove(FIELD_DATA).unwrap_or(Value::Null);
                let outcome = if is_error {
                    ResponseOutcome::Error(serde_json::from_value(data)?)
                } else {
                    ResponseOutcome::Success(data)
                };
                Message::SetActivityResponse(SetActivityResponse { nonce, outcome })
            }
            _ => Message::Unknown(UnknownMessage {
                command,
                nonce,
                body: object,
            }),
        };

        Ok(message)
    }
}

impl From<SetActivityRequest> for Message {
    fn from(request: SetActivityRequest) -> Self {
        Message::SetActivityRequest(request)
    }
}

fn nonce_value(nonce: &Option<String>) -> Value {
    nonce.clone().map(Value::String).unwrap_or(Value::Null)
}

// Non-string values (including null) are treated as absent.
fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

// Only the plain data types above are serialized here; none of them can fail.
fn to_value_or_null<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
