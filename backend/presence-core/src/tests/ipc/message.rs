use crate::error::ipc::IpcError;
use crate::ipc::message::{
    Dispatch, DispatchEvent, ErrorPayload, Message, ReadyConfig, ResponseOutcome,
    SetActivityRequest, SetActivityResponse,
};

use models::{Activity, ActivityType};

use serde_json::json;

/// **VALUE**: Verifies decoding of the READY dispatch the companion sends after the handshake.
///
/// **WHY THIS MATTERS**: READY is what flips the connection to ready and triggers the
/// presence publish. If it decodes to anything else, nothing is ever shown.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The `evt` discriminator is ignored
/// - The `v` field rename is lost
/// - Unexpected extra fields (e.g. `user`) make decoding fail
#[test]
fn given_ready_dispatch_when_decoding_then_returns_ready_event() {
    // GIVEN: A READY dispatch as the companion sends it
    let value = json!({
        "cmd": "DISPATCH",
        "nonce": null,
        "evt": "READY",
        "data": {
            "v": 1,
            "config": {
                "cdn_host": "cdn.discordapp.com",
                "api_endpoint": "//discord.com/api",
                "environment": "production"
            },
            "user": { "id": "42", "username": "someone" }
        }
    });

    // WHEN: Decoding
    let message = Message::from_value(value).unwrap();

    // THEN: A Ready dispatch with the routing config
    let Message::Dispatch(Dispatch {
        event: DispatchEvent::Ready(ready),
        ..
    }) = message
    else {
        panic!("expected READY dispatch, got {message:?}");
    };
    assert_eq!(ready.version, 1);
    assert_eq!(
        ready.config,
        ReadyConfig {
            cdn_host: Some("cdn.discordapp.com".into()),
            api_endpoint: Some("//discord.com/api".into()),
            environment: Some("production".into()),
        }
    );
    assert_eq!(
        ready.user,
        json!({ "id": "42", "username": "someone" }).as_object().cloned()
    );
}

/// **VALUE**: Verifies that dispatches are never correlated, even with a nonce.
///
/// **WHY THIS MATTERS**: Broadcast notifications must reach listeners. Matching one against
/// a pending request by accident would swallow it.
///
/// **BUG THIS CATCHES**: Would catch if `correlation_id` starts returning dispatch nonces.
#[test]
fn given_dispatch_with_nonce_when_reading_correlation_id_then_returns_none() {
    // GIVEN: A dispatch carrying a nonce
    let value = json!({ "cmd": "DISPATCH", "nonce": "abc", "evt": "READY", "data": {} });

    // WHEN: Decoding and reading the correlation id
    let message = Message::from_value(value).unwrap();

    // THEN: Not correlatable
    assert_eq!(message.correlation_id(), None);
}

/// **VALUE**: Verifies the SET_ACTIVITY request document, including clearing.
///
/// **WHY THIS MATTERS**: Clearing presence is done by sending `activity: null`. Omitting the
/// key instead is rejected by the companion.
///
/// **BUG THIS CATCHES**: Would catch if `None` activities are skipped during serialization.
#[test]
fn given_set_activity_requests_when_serializing_then_matches_wire_shape() {
    // GIVEN: A publish and a clear
    let activity = Activity::builder()
        .with_type(ActivityType::Watching)
        .with_details("A film")
        .build()
        .unwrap();
    let mut publish = Message::from(SetActivityRequest::new(77, Some(activity)));
    publish.set_correlation_id("n-1");
    let clear = Message::from(SetActivityRequest::new(77, None));

    // WHEN: Serializing
    let publish = publish.to_value();
    let clear = clear.to_value();

    // THEN: Expected documents
    assert_eq!(
        publish,
        json!({
            "cmd": "SET_ACTIVITY",
            "nonce": "n-1",
            "args": { "pid": 77, "activity": { "type": 3, "details": "A film" } }
        })
    );
    assert_eq!(
        clear,
        json!({ "cmd": "SET_ACTIVITY", "nonce": null, "args": { "pid": 77, "activity": null } })
    );
}

/// **VALUE**: Verifies that SET_ACTIVITY responses decode into success or error outcomes.
///
/// **WHY THIS MATTERS**: The companion signals rejection with `evt: "ERROR"` on the
/// response itself. Treating that as success would hide invalid activities.
///
/// **BUG THIS CATCHES**: Would catch if the `evt` check is dropped for responses.
#[test]
fn given_set_activity_responses_when_decoding_then_distinguishes_error() {
    // GIVEN: A success and an error response
    let success = json!({ "cmd": "SET_ACTIVITY", "nonce": "a", "evt": null, "data": { "type": 0 } });
    let failure = json!({
        "cmd": "SET_ACTIVITY",
        "nonce": "b",
        "evt": "ERROR",
        "data": { "code": 4000, "message": "child \"activity\" fails" }
    });

    // WHEN: Decoding both
    let success = Message::from_value(success).unwrap();
    let failure = Message::from_value(failure).unwrap();

    // THEN: Outcomes and nonces are preserved
    assert_eq!(
        success,
        Message::SetActivityResponse(SetActivityResponse {
            nonce: Some("a".into()),
            outcome: ResponseOutcome::Success(json!({ "type": 0 })),
        })
    );
    assert_eq!(
        failure,
        Message::SetActivityResponse(SetActivityResponse {
            nonce: Some("b".into()),
            outcome: ResponseOutcome::Error(ErrorPayload {
                code: 4000,
                message: "child \"activity\" fails".into(),
            }),
        })
    );
}

/// **VALUE**: Verifies forward compatibility for commands this crate does not model.
///
/// **WHY THIS MATTERS**: The companion adds commands over time. An unknown `cmd` must be
/// delivered as data, not tear down the read loop.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Unknown commands fail to decode
/// - Unknown fields are dropped, so re-encoding loses information
#[test]
fn given_unknown_command_when_decoding_then_preserves_fields() {
    // GIVEN: An unmodeled command
    let value = json!({ "cmd": "SUBSCRIBE", "nonce": "s-1", "evt": "ACTIVITY_JOIN", "args": {} });

    // WHEN: Decoding and re-encoding
    let message = Message::from_value(value.clone()).unwrap();
    let encoded = message.to_value();

    // THEN: Unknown variant, correlatable, lossless
    assert!(matches!(message, Message::Unknown(_)));
    assert_eq!(message.command(), Some("SUBSCRIBE"));
    assert_eq!(message.correlation_id(), Some("s-1"));
    assert_eq!(encoded, value);
}

/// **VALUE**: Verifies that unknown dispatch events are kept with their data.
///
/// **WHY THIS MATTERS**: Listeners may care about events this crate never heard of.
///
/// **BUG THIS CATCHES**: Would catch if unknown events are dropped or fail to decode.
#[test]
fn given_unknown_event_when_decoding_then_returns_unknown_dispatch() {
    // GIVEN: An unmodeled event
    let value = json!({ "cmd": "DISPATCH", "evt": "ACTIVITY_JOIN", "data": { "secret": "x" } });

    // WHEN: Decoding
    let message = Message::from_value(value).unwrap();

    // THEN: Unknown event with its name and data
    assert_eq!(
        message,
        Message::Dispatch(Dispatch {
            nonce: None,
            event: DispatchEvent::Unknown {
                name: "ACTIVITY_JOIN".into(),
                data: json!({ "secret": "x" }),
            },
        })
    );
}

/// **VALUE**: Verifies that non-object payloads are rejected as recoverable decode errors.
///
/// **WHY THIS MATTERS**: The read loop decides whether to continue based on this error kind.
///
/// **BUG THIS CATCHES**: Would catch a panic or a fatal error on `[]` payloads.
#[test]
fn given_non_object_payload_when_decoding_then_returns_frame_decode_error() {
    // GIVEN: An array
    let value = json!([1, 2, 3]);

    // WHEN: Decoding
    let error = Message::from_value(value).unwrap_err();

    // THEN: FrameDecode
    assert!(matches!(error, IpcError::FrameDecode { .. }));
}

/// **VALUE**: Verifies that a modeled command with a malformed shape is a decode error.
///
/// **WHY THIS MATTERS**: Accepting a request without a numeric pid would hand listeners a
/// half-built value.
///
/// **BUG THIS CATCHES**: Would catch if argument decoding falls back to defaults silently.
#[test]
fn given_request_with_invalid_args_when_decoding_then_returns_frame_decode_error() {
    // GIVEN: A SET_ACTIVITY request whose pid is a string
    let value = json!({ "cmd": "SET_ACTIVITY", "nonce": "x", "args": { "pid": "nope" } });

    // WHEN: Decoding
    let result = Message::from_value(value);

    // THEN: FrameDecode
    assert!(matches!(result, Err(IpcError::FrameDecode { .. })));
}
