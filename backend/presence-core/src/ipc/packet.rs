//! Typed frame payloads, one variant per opcode.

use crate::error::ipc::IpcError;
use crate::ipc::codec::RawFrame;
use crate::ipc::message::Message;
use crate::ipc::opcode::Opcode;

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// First frame written on every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub v: u32,
    pub client_id: String,
}

impl Handshake {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: crate::PROTOCOL_VERSION,
            client_id: client_id.into(),
        }
    }
}

/// Sent by the companion right before it drops the connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CloseFrame {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Handshake(Handshake),
    Message(Message),
    Close(CloseFrame),
    /// Echoed back verbatim as [`Packet::Pong`].
    Ping(Map<String, Value>),
    Pong(Map<String, Value>),
}

impl Packet {
    pub fn opcode(&self) -> Opcode {
        match self {
            Packet::Handshake(_) => Opcode::Handshake,
            Packet::Message(_) => Opcode::Frame,
            Packet::Close(_) => Opcode::Close,
            Packet::Ping(_) => Opcode::Ping,
            Packet::Pong(_) => Opcode::Pong,
        }
    }

    /// Serialize the payload bytes (without the header).
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::FrameEncode`] if JSON serialization fails.
    #[track_caller]
    pub fn to_payload(&self) -> Result<Vec<u8>, IpcError> {
        let result = match self {
            Packet::Handshake(handshake) => serde_json::to_vec(handshake),
            Packet::Message(message) => serde_json::to_vec(&message.to_value()),
            Packet::Close(close) => serde_json::to_vec(close),
            Packet::Ping(body) | Packet::Pong(body) => serde_json::to_vec(body),
        };

        result.map_err(|e| IpcError::FrameEncode {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Decode a complete frame into its typed form.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::FrameDecode`] for an unknown opcode or a payload
    /// that does not match the opcode's shape.
    #[track_caller]
    pub fn from_frame(frame: &RawFrame) -> Result<Packet, IpcError> {
        let opcode = Opcode::try_from(frame.opcode)?;

        let packet = match opcode {
            Opcode::Handshake => Packet::Handshake(serde_json::from_slice(&frame.payload)?),
            Opcode::Frame => {
                let value: Value = serde_json::from_slice(&frame.payload)?;
                Packet::Message(Message::from_value(value)?)
            }
            Opcode::Close => Packet::Close(serde_json::from_slice(&frame.payload)?),
            Opcode::Ping => Packet::Ping(open_document(&frame.payload)?),
            Opcode::Pong => Packet::Pong(open_document(&frame.payload)?),
        };

        Ok(packet)
    }
}

// An empty payload is treated as an empty document.
#[track_caller]
fn open_document(payload: &[u8]) -> Result<Map<String, Value>, IpcError> {
    if payload.is_empty() {
        return Ok(Map::new());
    }
    Ok(serde_json::from_slice(payload)?)
}
