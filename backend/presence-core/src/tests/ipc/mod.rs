mod correlation;
mod listener;
mod message;

use crate::ipc::codec::HEADER_SIZE;
use crate::ipc::message::Message;

/// Decode a FRAME packet captured from the writer queue.
fn sent_message(bytes: &[u8]) -> Message {
    let opcode = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    assert_eq!(opcode, 1, "expected a FRAME packet");
    assert_eq!(length, bytes.len() - HEADER_SIZE, "length must match the payload");

    let value = serde_json::from_slice(&bytes[HEADER_SIZE..]).unwrap();
    Message::from_value(value).unwrap()
}
