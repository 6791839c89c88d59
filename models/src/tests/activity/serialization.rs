use crate::{Activity, ActivityParty, ActivityTimestamps, ActivityType, PartyPrivacy};

use serde_json::json;

/// **VALUE**: Verifies the JSON shape sent to the companion process.
///
/// **WHY THIS MATTERS**: The companion expects integer enum codes, a `[current, max]` size
/// array and no `null` fields. A shape change is invisible locally and only shows up as an
/// ERROR response from the companion.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Enum codes are serialized as strings
/// - `None` fields start being emitted as `null`
/// - The activity type field loses its `type` rename
#[test]
fn given_activity_when_serialized_then_matches_wire_shape() {
    // GIVEN: An activity with a public party and open-ended timestamps
    let activity = Activity::builder()
        .with_type(ActivityType::Listening)
        .with_state("In lobby")
        .with_party(
            ActivityParty::builder("party-1", 2)
                .with_maximum_size(10)
                .with_privacy(PartyPrivacy::Public)
                .build()
                .unwrap(),
        )
        .with_timestamps(ActivityTimestamps::new(1_700_000_000_000, None))
        .build()
        .unwrap();

    // WHEN: Serializing to JSON
    let value = serde_json::to_value(&activity).unwrap();

    // THEN: Matches the expected document exactly
    assert_eq!(
        value,
        json!({
            "type": 2,
            "state": "In lobby",
            "party": { "id": "party-1", "size": [2, 10], "privacy": 1 },
            "timestamps": { "start": 1_700_000_000_000u64 }
        })
    );
}

/// **VALUE**: Verifies that unknown activity type codes are rejected on decode.
///
/// **WHY THIS MATTERS**: Responses echo the activity back. Accepting arbitrary codes would
/// make `ActivityType` lie about what the companion actually stored.
///
/// **BUG THIS CATCHES**: Would catch if `TryFrom<u8>` falls back to a default variant.
#[test]
fn given_unknown_type_code_when_deserialized_then_fails() {
    // GIVEN: A document with type code 1 (unsupported)
    let document = json!({ "type": 1 });

    // WHEN: Deserializing
    let result = serde_json::from_value::<Activity>(document);

    // THEN: Fails with the validation message
    let error = result.unwrap_err().to_string();
    assert!(error.contains("Unsupported activity type: 1"), "{error}");
}

/// **VALUE**: Verifies that timestamps before the epoch clamp to zero instead of panicking.
///
/// **WHY THIS MATTERS**: Clock skew on user machines is common; a panic here would take down
/// the host application.
///
/// **BUG THIS CATCHES**: Would catch an `unwrap()` on `duration_since(UNIX_EPOCH)`.
#[test]
fn given_time_before_epoch_when_converting_then_clamps_to_zero() {
    // GIVEN: A time one second before the epoch
    let before_epoch = std::time::UNIX_EPOCH - std::time::Duration::from_secs(1);

    // WHEN: Converting
    let timestamps = ActivityTimestamps::from_system_time(before_epoch, Some(before_epoch));

    // THEN: Both clamp to zero
    assert_eq!(timestamps, ActivityTimestamps::new(0, Some(0)));
}
