//! Length-prefixed frame codec.
//!
//! ```text
//! [u32 LE opcode] [u32 LE length] [payload: length bytes of JSON]
//! ```
//!
//! Decoding reads the header and body with exact reads. Running out of bytes
//! anywhere inside a frame is end-of-stream, never a decode error: the
//! companion going away mid-frame is a disconnect, not a protocol violation.

use crate::error::ipc::IpcError;
use crate::ipc::opcode::Opcode;
use crate::ipc::packet::Packet;

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;

use log::trace;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_SIZE: usize = 8;

/// Largest payload accepted in either direction (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A frame whose payload has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub opcode: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Packet(Packet),
    EndOfStream,
}

/// Prefix `payload` with its header.
///
/// # Errors
///
/// Returns [`IpcError::FrameTooLarge`] if the payload exceeds [`MAX_PAYLOAD_SIZE`].
#[track_caller]
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, IpcError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(IpcError::FrameTooLarge {
            message: format!(
                "Payload of {} bytes exceeds the {MAX_PAYLOAD_SIZE} byte limit",
                payload.len()
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());
    buffer.extend_from_slice(&u32::from(opcode).to_le_bytes());
    buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buffer.extend_from_slice(payload);
    Ok(buffer)
}

#[track_caller]
pub fn encode(packet: &Packet) -> Result<Vec<u8>, IpcError> {
    let payload = packet.to_payload()?;
    encode_frame(packet.opcode(), &payload)
}

/// Read one complete frame without interpreting its payload.
///
/// Returns `Ok(None)` at end-of-stream.
///
/// # Errors
///
/// - [`IpcError::FrameTooLarge`] if the declared length is over the limit.
///   The body is not consumed, so the stream is no longer aligned.
/// - [`IpcError::Read`] for transport failures other than closure.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<RawFrame>, IpcError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_SIZE];
    if !read_exactly(reader, &mut header).await? {
        return Ok(None);
    }

    let opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    if length > MAX_PAYLOAD_SIZE {
        return Err(IpcError::FrameTooLarge {
            message: format!(
                "Declared length {length} exceeds the {MAX_PAYLOAD_SIZE} byte limit (opcode {opcode})"
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut payload = vec![0u8; length];
    if !read_exactly(reader, &mut payload).await? {
        return Ok(None);
    }

    trace!("Read frame: opcode={opcode} length={length}");
    Ok(Some(RawFrame { opcode, payload }))
}

/// Read and decode one frame.
///
/// # Errors
///
/// Anything [`read_frame`] returns, plus [`IpcError::FrameDecode`] when the
/// frame was read in full but its payload is malformed. The latter is
/// recoverable: the next call starts on the next frame's header.
pub async fn decode<R>(reader: &mut R) -> Result<Decoded, IpcError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match read_frame(reader).await? {
        Some(frame) => Ok(Decoded::Packet(Packet::from_frame(&frame)?)),
        None => Ok(Decoded::EndOfStream),
    }
}

// Fills `buffer`; `Ok(false)` means the stream closed first.
async fn read_exactly<R>(reader: &mut R, buffer: &mut [u8]) -> Result<bool, IpcError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match reader.read_exact(buffer).await {
        Ok(_) => Ok(true),
        Err(e) if is_end_of_stream(e.kind()) => Ok(false),
        Err(e) => Err(IpcError::Read {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}

fn is_end_of_stream(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
