use crate::helpers::{
    Companion, RefusingConnector, StallingConnector, TEST_CLIENT_ID, client_builder,
    wait_for_state, wait_until,
};

use presence_core::discovery::{EndpointResolver, StaticEndpoint};
use presence_core::error::discovery::DiscoveryError;
use presence_core::ipc::codec::Decoded;
use presence_core::ipc::{
    CloseFrame, EventListener, Message, Notification, Packet, ResponseOutcome,
    SetActivityRequest, SetActivityResponse, listener_fn,
};
use presence_core::{ConnectionState, IpcError, PresenceClient};

use common::ErrorLocation;
use models::Activity;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, json};

fn sample_activity() -> Activity {
    Activity::builder()
        .with_details("Editing main.rs")
        .with_state("Workspace: presence")
        .build()
        .expect("Sample activity should be valid")
}

fn success_response(nonce: &str) -> Message {
    Message::SetActivityResponse(SetActivityResponse {
        nonce: Some(nonce.to_string()),
        outcome: ResponseOutcome::Success(json!({"details": "Editing main.rs"})),
    })
}

/// Test helper: Records every notification a listener sees.
fn recording_listener() -> (Arc<dyn EventListener>, Arc<Mutex<Vec<Notification>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = listener_fn(move |notification| {
        sink.lock().unwrap().push(notification.clone());
    });
    (listener, seen)
}

struct MissingEndpoint;

impl EndpointResolver for MissingEndpoint {
    fn resolve_endpoint_path(&self) -> Result<PathBuf, DiscoveryError> {
        Err(DiscoveryError::NotFound {
            message: "No companion socket".to_string(),
            location: ErrorLocation::caller(),
        })
    }
}

// ============================================================================
// Handshake and READY
// ============================================================================

/// **VALUE**: The first frame on the wire is the handshake carrying the client id.
///
/// **WHY THIS MATTERS**: The companion drops connections whose first frame is
/// anything else.
///
/// **BUG THIS CATCHES**: Stored presence queued ahead of the handshake.
#[tokio::test]
async fn given_stored_activity_when_ready_then_handshake_first_and_activity_published() {
    // GIVEN a client with an activity stored before connecting
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    let nonce = client.update_activity(Some(sample_activity())).unwrap();
    assert!(nonce.is_none(), "Nothing is sent while disconnected");

    // WHEN the client connects and the companion answers with READY
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    let handshake = companion.expect_handshake().await;
    assert_eq!(client.state(), ConnectionState::Connecting);
    companion.send_ready().await;

    // THEN the handshake carried the client id and the activity follows it
    assert_eq!(handshake.v, 1);
    assert_eq!(handshake.client_id, TEST_CLIENT_ID);

    let Message::SetActivityRequest(request) = companion.read_message().await else {
        panic!("Expected SET_ACTIVITY after READY");
    };
    assert_eq!(request.args.activity, Some(sample_activity()));
    assert_eq!(request.args.pid, std::process::id());
    wait_for_state(&client, ConnectionState::Ready).await;

    // AND the acknowledgement resolves the pending request
    let nonce = request.nonce.expect("Published request must carry a nonce");
    companion.send_message(success_response(&nonce)).await;
    wait_until(|| client.pending_requests() == 0).await;
}

/// **VALUE**: READY with nothing stored sends nothing.
///
/// **BUG THIS CATCHES**: A null SET_ACTIVITY clearing presence the user never set.
#[tokio::test]
async fn given_no_stored_activity_when_ready_then_nothing_is_sent() {
    // GIVEN a connected client with no activity
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;

    // WHEN READY arrives, followed by a PING
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;
    let mut ping = Map::new();
    ping.insert("seq".to_string(), json!(7));
    companion.send(&Packet::Ping(ping.clone())).await;

    // THEN the next frame written is the PONG, so no SET_ACTIVITY was queued
    assert_eq!(companion.read_packet().await, Packet::Pong(ping));
    assert_eq!(client.pending_requests(), 0);
}

/// **VALUE**: Updates while READY go straight out; later READYs resend the latest.
#[tokio::test]
async fn given_ready_client_when_updating_and_clearing_then_each_is_published() {
    // GIVEN a READY client
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    // WHEN an activity is set and then cleared
    let set_nonce = client
        .update_activity(Some(sample_activity()))
        .unwrap()
        .expect("READY update must be sent");
    let clear_nonce = client
        .update_activity(None)
        .unwrap()
        .expect("READY clear must be sent");

    // THEN both requests arrive in order with their nonces
    let Message::SetActivityRequest(first) = companion.read_message().await else {
        panic!("Expected SET_ACTIVITY");
    };
    let Message::SetActivityRequest(second) = companion.read_message().await else {
        panic!("Expected SET_ACTIVITY");
    };
    assert_eq!(first.nonce.as_deref(), Some(set_nonce.as_str()));
    assert_eq!(first.args.activity, Some(sample_activity()));
    assert_eq!(second.nonce.as_deref(), Some(clear_nonce.as_str()));
    assert_eq!(second.args.activity, None);
    assert_eq!(client.current_activity(), None);
}

// ============================================================================
// Read loop
// ============================================================================

/// **VALUE**: A stream ending mid-header is a clean end-of-stream.
///
/// **BUG THIS CATCHES**: Treating a partial header as a decode error and
/// spinning on a dead socket.
#[tokio::test]
async fn given_ready_client_when_stream_ends_mid_header_then_disconnected() {
    // GIVEN a READY client
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    // WHEN the companion writes three header bytes and goes away
    companion.send_raw(&[1, 0, 0]).await;
    drop(companion);

    // THEN the client ends up DISCONNECTED and refuses to send
    wait_for_state(&client, ConnectionState::Disconnected).await;
    assert!(!client.is_connected());
    let result = client.send_fire_and_forget(Message::from(SetActivityRequest::new(1, None)));
    assert!(matches!(result, Err(IpcError::NotConnected { .. })));
}

/// **VALUE**: A header declaring more than the payload limit ends the connection.
///
/// **BUG THIS CATCHES**: Allocating the declared length, or skipping the frame and
/// reading the rest of the stream out of sync.
#[tokio::test]
async fn given_ready_client_when_header_declares_oversized_payload_then_disconnected() {
    // GIVEN a READY client
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    // WHEN the companion sends a FRAME header declaring 4 GiB and keeps the stream open
    let mut header = Vec::new();
    header.extend_from_slice(&1u32.to_le_bytes());
    header.extend_from_slice(&u32::MAX.to_le_bytes());
    companion.send_raw(&header).await;

    // THEN the client tears the connection down and closes its end
    wait_for_state(&client, ConnectionState::Disconnected).await;
    assert_eq!(companion.read().await, Decoded::EndOfStream);
}

/// **VALUE**: A malformed frame is skipped and the connection carries on.
#[tokio::test]
async fn given_malformed_frame_when_ready_follows_then_client_becomes_ready() {
    // GIVEN a connected client
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.expect_handshake().await;

    // WHEN a FRAME with invalid JSON precedes READY
    let garbage = b"{not json";
    let mut frame = Vec::new();
    frame.extend_from_slice(&1u32.to_le_bytes());
    frame.extend_from_slice(&(garbage.len() as u32).to_le_bytes());
    frame.extend_from_slice(garbage);
    companion.send_raw(&frame).await;
    companion.send_ready().await;

    // THEN READY is still processed
    wait_for_state(&client, ConnectionState::Ready).await;
}

/// **VALUE**: CLOSE is surfaced to listeners before the disconnect.
#[tokio::test]
async fn given_listener_when_companion_sends_close_then_listener_sees_it() {
    // GIVEN a connected client with a recording listener
    let (builder, mut companions) = client_builder();
    let (listener, seen) = recording_listener();
    let client = builder.with_listener(listener).build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;

    // WHEN the companion sends CLOSE and hangs up
    let close = CloseFrame {
        code: 4000,
        message: "Invalid client ID".to_string(),
    };
    companion.send(&Packet::Close(close.clone())).await;
    drop(companion);

    // THEN the listener received it and the client is disconnected
    wait_for_state(&client, ConnectionState::Disconnected).await;
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&Notification::Closed(close)));
}

/// **VALUE**: A panicking listener does not stop the read loop.
#[tokio::test]
async fn given_panicking_listener_when_ready_then_connection_keeps_working() {
    // GIVEN a listener that panics on every notification
    let (builder, mut companions) = client_builder();
    let client = builder
        .with_listener(listener_fn(|_| panic!("listener failed")))
        .build()
        .unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;

    // WHEN READY and then a PING arrive
    companion.accept().await;
    companion.send(&Packet::Ping(Map::new())).await;

    // THEN the state advanced and the PING was answered
    assert_eq!(companion.read_packet().await, Packet::Pong(Map::new()));
    assert_eq!(client.state(), ConnectionState::Ready);
}

// ============================================================================
// Correlation
// ============================================================================

/// **VALUE**: A response goes to its request or to listeners, never both.
///
/// **BUG THIS CATCHES**: Unmatched responses silently dropped, or matched
/// ones duplicated to listeners.
#[tokio::test]
async fn given_pending_request_when_responses_arrive_then_matched_resolves_and_unmatched_notifies() {
    // GIVEN a READY client with a recording listener
    let (builder, mut companions) = client_builder();
    let (listener, seen) = recording_listener();
    let client = builder.with_listener(listener).build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    // WHEN a request is answered, preceded by a response nobody asked for
    let stray = success_response("not-a-pending-nonce");
    let request = Message::from(SetActivityRequest::new(42, Some(sample_activity())));
    let script = async {
        let Message::SetActivityRequest(sent) = companion.read_message().await else {
            panic!("Expected SET_ACTIVITY");
        };
        companion.send_message(stray.clone()).await;
        let nonce = sent.nonce.expect("Request must carry a nonce");
        companion.send_message(success_response(&nonce)).await;
        nonce
    };
    let (response, nonce) = tokio::join!(client.request(request), script);

    // THEN the caller got the matching response
    let response = response.unwrap();
    assert_eq!(response.correlation_id(), Some(nonce.as_str()));

    // AND only the stray one reached listeners
    let seen = seen.lock().unwrap();
    let messages: Vec<&Notification> = seen
        .iter()
        .filter(|n| !matches!(n, Notification::Message(Message::Dispatch(_))))
        .collect();
    assert_eq!(messages, vec![&Notification::Message(stray)]);
}

/// **VALUE**: A request with no answer fails with a timeout.
#[tokio::test]
async fn given_short_timeout_when_companion_never_answers_then_request_times_out() {
    // GIVEN a client with a 200ms request timeout
    let (builder, mut companions) = client_builder();
    let client = builder
        .with_request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    // WHEN a request is sent and never answered
    let result = client
        .request(Message::from(SetActivityRequest::new(42, None)))
        .await;

    // THEN it fails with a timeout and nothing stays pending
    assert!(matches!(result, Err(IpcError::RequestTimeout { .. })));
    assert_eq!(client.pending_requests(), 0);
}

/// **VALUE**: Losing the connection fails outstanding requests.
#[tokio::test]
async fn given_pending_request_when_companion_disconnects_then_request_fails() {
    // GIVEN a READY client with an outstanding request
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    let outcome = Arc::new(Mutex::new(None));
    let sink = outcome.clone();
    client
        .send_request(
            Message::from(SetActivityRequest::new(42, None)),
            move |result| *sink.lock().unwrap() = Some(result),
        )
        .unwrap();
    companion.read_message().await;

    // WHEN the companion goes away
    drop(companion);

    // THEN the continuation saw a disconnect
    wait_for_state(&client, ConnectionState::Disconnected).await;
    wait_until(|| outcome.lock().unwrap().is_some()).await;
    let outcome = outcome.lock().unwrap().take().unwrap();
    assert!(matches!(outcome, Err(IpcError::Disconnected { .. })));
}

// ============================================================================
// Connect, reconnect and shutdown
// ============================================================================

/// **VALUE**: Connecting again replaces the old connection entirely.
///
/// **BUG THIS CATCHES**: Two read loops feeding the same listeners.
#[tokio::test]
async fn given_ready_client_when_connecting_again_then_old_stream_closes_and_activity_republished() {
    // GIVEN a READY client with a stored activity
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.update_activity(Some(sample_activity())).unwrap();
    client.connect().await.unwrap();
    let mut first = companions.next().await;
    first.accept().await;
    first.read_message().await;
    wait_for_state(&client, ConnectionState::Ready).await;

    // WHEN connect is called again
    client.connect().await.unwrap();
    let mut second = companions.next().await;

    // THEN the old stream ends and the new one starts with a handshake
    assert_eq!(first.read().await, Decoded::EndOfStream);
    second.expect_handshake().await;
    assert_eq!(client.state(), ConnectionState::Connecting);

    // AND the stored activity is published on the new READY
    second.send_ready().await;
    let Message::SetActivityRequest(request) = second.read_message().await else {
        panic!("Expected SET_ACTIVITY on the new connection");
    };
    assert_eq!(request.args.activity, Some(sample_activity()));
    wait_for_state(&client, ConnectionState::Ready).await;
}

/// **VALUE**: A refused connection reports EndpointUnavailable and resets state.
#[tokio::test]
async fn given_refusing_transport_when_connecting_then_endpoint_unavailable() {
    // GIVEN a client whose transport refuses connections
    let client = PresenceClient::builder(TEST_CLIENT_ID)
        .with_connector(Arc::new(RefusingConnector))
        .with_endpoint_resolver(Arc::new(StaticEndpoint::new("/test/discord-ipc-0")))
        .build()
        .unwrap();

    // WHEN connecting
    let result = client.connect().await;

    // THEN the error names the failure and the client is DISCONNECTED
    let Err(IpcError::EndpointUnavailable { message, .. }) = result else {
        panic!("Expected EndpointUnavailable, got {result:?}");
    };
    assert!(message.contains("/test/discord-ipc-0"));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

/// **VALUE**: A failed handshake write fails requests registered while it was pending.
///
/// **BUG THIS CATCHES**: A continuation left in the pending map with no sweeper
/// running, so it never completes until the next connect.
#[tokio::test]
async fn given_pending_request_when_handshake_write_fails_then_request_fails() {
    // GIVEN a connect whose handshake write is stalled
    let (connector, mut peers) = StallingConnector::new();
    let client = Arc::new(
        PresenceClient::builder(TEST_CLIENT_ID)
            .with_connector(Arc::new(connector))
            .with_endpoint_resolver(Arc::new(StaticEndpoint::new("/test/discord-ipc-0")))
            .build()
            .unwrap(),
    );
    let connecting = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let stalled = tokio::time::timeout(Duration::from_secs(5), peers.recv())
        .await
        .expect("Timed out waiting for a connection")
        .expect("Connector dropped");

    // AND a request registered once the outbound path is attached
    let outcome = Arc::new(Mutex::new(None));
    wait_until(|| {
        let sink = outcome.clone();
        client
            .send_request(
                Message::from(SetActivityRequest::new(42, None)),
                move |result| *sink.lock().unwrap() = Some(result),
            )
            .is_ok()
    })
    .await;
    assert_eq!(client.pending_requests(), 1);

    // WHEN the companion stops reading and the handshake write fails
    drop(stalled.write);
    let result = connecting.await.unwrap();

    // THEN connect reports EndpointUnavailable and the request saw a disconnect
    assert!(matches!(result, Err(IpcError::EndpointUnavailable { .. })));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.pending_requests(), 0);
    let outcome = outcome.lock().unwrap().take();
    assert!(matches!(outcome, Some(Err(IpcError::Disconnected { .. }))));
    drop(stalled.read);
}

/// **VALUE**: Failed discovery is also EndpointUnavailable.
#[tokio::test]
async fn given_no_endpoint_when_connecting_then_endpoint_unavailable() {
    // GIVEN a client whose discovery finds nothing
    let (builder, _companions) = client_builder();
    let client = builder
        .with_endpoint_resolver(Arc::new(MissingEndpoint))
        .build()
        .unwrap();

    // WHEN connecting
    let result = client.connect().await;

    // THEN the state is DISCONNECTED again
    assert!(matches!(result, Err(IpcError::EndpointUnavailable { .. })));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

/// **VALUE**: Shutdown closes the stream and keeps the stored activity.
#[tokio::test]
async fn given_ready_client_when_shutting_down_then_stream_closes() {
    // GIVEN a READY client with a stored activity
    let (builder, mut companions) = client_builder();
    let client = builder.build().unwrap();
    client.connect().await.unwrap();
    let mut companion: Companion = companions.next().await;
    companion.accept().await;
    wait_for_state(&client, ConnectionState::Ready).await;
    client.update_activity(Some(sample_activity())).unwrap();
    companion.read_message().await;

    // WHEN the client shuts down
    client.shutdown().await;

    // THEN the companion sees end-of-stream and the activity is kept
    assert_eq!(companion.read().await, Decoded::EndOfStream);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.current_activity(), Some(sample_activity()));
}
