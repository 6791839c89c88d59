//! The background read loop of one connection.

use crate::ipc::codec::{self, Decoded};
use crate::ipc::connection_state::{ConnectionState, ConnectionStateCell};
use crate::ipc::correlation::Correlator;
use crate::ipc::listener::{ListenerRegistry, Notification};
use crate::ipc::packet::Packet;
use crate::transport::BoxedReader;

use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use tokio::sync::watch;

/// What the read loop needs from the client.
#[derive(Clone)]
pub(crate) struct LoopContext {
    pub(crate) state: Arc<ConnectionStateCell>,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) listeners: Arc<ListenerRegistry>,
}

/// Decode and dispatch frames until end-of-stream, a fatal read error, or
/// cancellation.
///
/// Cancellation returns without touching shared state: whoever cancelled
/// owns the teardown. End-of-stream and fatal errors tear down here.
pub(crate) async fn run(
    mut reader: BoxedReader,
    context: LoopContext,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        let cancelled = *cancel.borrow();
        if cancelled {
            debug!("Read loop cancelled");
            return;
        }

        let decoded = tokio::select! {
            biased;
            _ = cancel.changed() => {
                debug!("Read loop cancelled while waiting for a frame");
                return;
            }
            decoded = codec::decode(&mut reader) => decoded,
        };

        match decoded {
            Ok(Decoded::Packet(packet)) => handle_packet(&context, packet),
            Ok(Decoded::EndOfStream) => {
                info!("Companion closed the connection");
                break;
            }
            Err(e) if e.is_recoverable() => warn!("Skipping malformed frame: {e}"),
            Err(e) => {
                error!("Read loop stopping: {e}");
                break;
            }
        }
    }

    handle_disconnect(&context);
}

pub(crate) fn handle_packet(context: &LoopContext, packet: Packet) {
    match packet {
        Packet::Message(message) => {
            if let Some(message) = context.correlator.resolve(message) {
                context
                    .listeners
                    .dispatch(&Notification::Message(message));
            }
        }
        Packet::Ping(body) => {
            trace!("PING received, replying with PONG");
            if let Err(e) = context.correlator.send_packet(&Packet::Pong(body)) {
                warn!("Failed to queue PONG: {e}");
            }
        }
        Packet::Pong(_) => trace!("PONG received"),
        Packet::Close(close) => {
            warn!(
                "Companion is closing the connection: {} (code {})",
                close.message, close.code
            );
            context.listeners.dispatch(&Notification::Closed(close));
        }
        Packet::Handshake(handshake) => {
            debug!(
                "Ignoring HANDSHAKE frame from companion (v{})",
                handshake.v
            )
        }
    }
}

fn handle_disconnect(context: &LoopContext) {
    // Detach first so nothing observed as DISCONNECTED can still be queued.
    context.correlator.detach();
    context.state.set(ConnectionState::Disconnected);
    context.correlator.fail_all("Connection closed");
    info!("Disconnected from companion; call connect() to reconnect");
}
