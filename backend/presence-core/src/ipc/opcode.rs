use crate::error::ipc::IpcError;

use common::ErrorLocation;

use std::panic::Location;

/// Frame opcodes, sent as a little-endian `u32` in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> Self {
        opcode as u32
    }
}

impl TryFrom<u32> for Opcode {
    type Error = IpcError;

    #[track_caller]
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(IpcError::FrameDecode {
                message: format!("Unknown opcode: {other}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}
