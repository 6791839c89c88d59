//! Test helpers for client integration tests.
//!
//! The companion process is simulated over `tokio::io::duplex`: every
//! `connect` hands the test a [`Companion`] holding the far end of the pipe.

use presence_core::discovery::StaticEndpoint;
use presence_core::ipc::codec::{self, Decoded};
use presence_core::ipc::{Dispatch, DispatchEvent, Handshake, Message, Packet, ReadyEvent};
use presence_core::transport::{Channel, Connector};
use presence_core::{ConnectionState, PresenceClient, PresenceClientBuilder};

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// Client id used by every test client.
pub const TEST_CLIENT_ID: &str = "123";

const WAIT: Duration = Duration::from_secs(5);

/// Connector that hands the far end of each new pipe to the test.
pub struct DuplexConnector {
    companions: mpsc::UnboundedSender<DuplexStream>,
}

impl Connector for DuplexConnector {
    fn connect<'a>(&'a self, _endpoint: &'a Path) -> BoxFuture<'a, io::Result<Channel>> {
        Box::pin(async move {
            let (client, companion) = tokio::io::duplex(64 * 1024);
            self.companions
                .send(companion)
                .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "test ended"))?;
            Ok(Channel::from_stream(client))
        })
    }
}

/// Connector that always fails, like a missing socket.
pub struct RefusingConnector;

impl Connector for RefusingConnector {
    fn connect<'a>(&'a self, _endpoint: &'a Path) -> BoxFuture<'a, io::Result<Channel>> {
        Box::pin(async {
            Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}

/// Connector with separate read and write pipes. The write pipe holds a
/// single byte, so the handshake stalls until the test drops its far end.
pub struct StallingConnector {
    peers: mpsc::UnboundedSender<StalledPeers>,
}

/// Far ends of a [`StallingConnector`] connection.
pub struct StalledPeers {
    pub read: DuplexStream,
    pub write: DuplexStream,
}

impl StallingConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StalledPeers>) {
        let (peers, receiver) = mpsc::unbounded_channel();
        (Self { peers }, receiver)
    }
}

impl Connector for StallingConnector {
    fn connect<'a>(&'a self, _endpoint: &'a Path) -> BoxFuture<'a, io::Result<Channel>> {
        Box::pin(async move {
            let (reader, read) = tokio::io::duplex(64 * 1024);
            let (writer, write) = tokio::io::duplex(1);
            self.peers
                .send(StalledPeers { read, write })
                .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "test ended"))?;
            Ok(Channel::new(reader, writer))
        })
    }
}

/// Receives the companion side of every connection the client opens.
pub struct Companions {
    receiver: mpsc::UnboundedReceiver<DuplexStream>,
}

impl Companions {
    pub async fn next(&mut self) -> Companion {
        let stream = tokio::time::timeout(WAIT, self.receiver.recv())
            .await
            .expect("Timed out waiting for a connection")
            .expect("Connector dropped");
        Companion { stream }
    }
}

/// Test helper: Builder wired to an in-memory companion.
pub fn client_builder() -> (PresenceClientBuilder, Companions) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let builder = PresenceClient::builder(TEST_CLIENT_ID)
        .with_connector(Arc::new(DuplexConnector { companions: sender }))
        .with_endpoint_resolver(Arc::new(StaticEndpoint::new("/test/discord-ipc-0")));
    (builder, Companions { receiver })
}

/// The companion's end of one connection.
pub struct Companion {
    stream: DuplexStream,
}

impl Companion {
    /// Test helper: Read the next packet the client wrote.
    pub async fn read_packet(&mut self) -> Packet {
        match self.read().await {
            Decoded::Packet(packet) => packet,
            Decoded::EndOfStream => panic!("Client closed the connection"),
        }
    }

    /// Test helper: Read and return whatever comes next, including end-of-stream.
    pub async fn read(&mut self) -> Decoded {
        tokio::time::timeout(WAIT, codec::decode(&mut self.stream))
            .await
            .expect("Timed out waiting for a frame")
            .expect("Client wrote an invalid frame")
    }

    /// Test helper: Read the next packet, which must be a FRAME message.
    pub async fn read_message(&mut self) -> Message {
        match self.read_packet().await {
            Packet::Message(message) => message,
            other => panic!("Expected a FRAME packet, got {other:?}"),
        }
    }

    pub async fn expect_handshake(&mut self) -> Handshake {
        match self.read_packet().await {
            Packet::Handshake(handshake) => handshake,
            other => panic!("Expected HANDSHAKE, got {other:?}"),
        }
    }

    pub async fn send(&mut self, packet: &Packet) {
        let bytes = codec::encode(packet).expect("Failed to encode packet");
        self.send_raw(&bytes).await;
    }

    pub async fn send_message(&mut self, message: Message) {
        self.send(&Packet::Message(message)).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream
            .write_all(bytes)
            .await
            .expect("Failed to write to client");
    }

    pub async fn send_ready(&mut self) {
        self.send_message(Message::Dispatch(Dispatch {
            nonce: None,
            event: DispatchEvent::Ready(ReadyEvent {
                version: 1,
                ..ReadyEvent::default()
            }),
        }))
        .await;
    }

    /// Test helper: Handshake, then READY.
    pub async fn accept(&mut self) -> Handshake {
        let handshake = self.expect_handshake().await;
        self.send_ready().await;
        handshake
    }
}

/// Test helper: Poll until the client reaches `state`.
pub async fn wait_for_state(client: &PresenceClient, state: ConnectionState) {
    let polled = tokio::time::timeout(WAIT, async {
        while client.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        polled.is_ok(),
        "Timed out waiting for {state}, still {}",
        client.state()
    );
}

/// Test helper: Poll until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "Timed out waiting for condition");
}
