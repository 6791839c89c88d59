//! The protocol engine.
//!
//! - [`codec`] and [`packet`]: the 8-byte header framing and typed payloads
//! - [`message`]: the `cmd`/`evt` tagged union carried by FRAME packets
//! - [`connection_state`]: DISCONNECTED -> CONNECTING -> READY
//! - [`correlation`]: nonce-keyed pending requests with timeouts
//! - [`listener`]: ordered, panic-isolated notification fan-out
//! - [`presence`]: the stored activity, republished on every READY
//!
//! [`PresenceClient`] ties them together around one connection: a read loop
//! decoding frames, a writer task draining the send queue, and a sweeper
//! evicting timed-out requests.

mod builder;
mod client;
pub mod codec;
pub mod connection_state;
pub mod correlation;
mod handle;
pub mod listener;
pub mod message;
pub mod opcode;
pub mod packet;
pub mod presence;
mod read_loop;
mod writer;

pub use builder::PresenceClientBuilder;
pub use client::PresenceClient;
pub use connection_state::ConnectionState;
pub use correlation::Continuation;
pub use listener::{EventListener, FnListener, ListenerRegistry, Notification, listener_fn};
pub use message::{
    Dispatch, DispatchEvent, ErrorPayload, Message, ReadyConfig, ReadyEvent, ResponseOutcome,
    SetActivityArgs, SetActivityRequest, SetActivityResponse, UnknownMessage,
};
pub use opcode::Opcode;
pub use packet::{CloseFrame, Handshake, Packet};
