use crate::{
    ActivityAssets, ActivityBuilder, ActivityParty, ActivityType, ModelError, PartyPrivacy,
};

/// **VALUE**: Verifies that a fully populated builder produces the expected Activity.
///
/// **WHY THIS MATTERS**: The builder is the only supported way for applications to create
/// presence payloads. If it drops a field, the companion silently shows an incomplete card.
///
/// **BUG THIS CATCHES**: Would catch if a `with_*` setter stops being wired into `build()`.
#[test]
fn given_all_fields_when_building_activity_then_returns_populated_activity() {
    // GIVEN: A party, assets and a builder with every field set
    let party = ActivityParty::builder("party-1", 2)
        .with_maximum_size(10)
        .with_privacy(PartyPrivacy::Public)
        .build()
        .expect("party should be valid");
    let assets = ActivityAssets::builder()
        .with_large_image("logo")
        .with_large_text("The logo")
        .build()
        .expect("assets should be valid");

    // WHEN: Building the activity
    let activity = ActivityBuilder::default()
        .with_type(ActivityType::Competing)
        .with_details("Selecting a game mode")
        .with_state("In lobby")
        .with_state_url("https://example.com/lobby")
        .with_party(party.clone())
        .with_assets(assets.clone())
        .build()
        .expect("activity should be valid");

    // THEN: Every field is carried through
    assert_eq!(activity.activity_type, ActivityType::Competing);
    assert_eq!(activity.details.as_deref(), Some("Selecting a game mode"));
    assert_eq!(activity.state.as_deref(), Some("In lobby"));
    assert_eq!(activity.party, Some(party));
    assert_eq!(activity.assets, Some(assets));
    assert!(activity.timestamps.is_none());
}

/// **VALUE**: Verifies that one-character state strings are rejected.
///
/// **WHY THIS MATTERS**: The companion rejects the whole SET_ACTIVITY request when a text
/// field is out of range. Catching it at build time gives the caller an error they can act on
/// instead of an asynchronous ERROR response.
///
/// **BUG THIS CATCHES**: Would catch if the length bounds are removed or off by one.
#[test]
fn given_single_character_state_when_building_then_returns_validation_error() {
    // GIVEN: A builder with a too-short state
    let builder = ActivityBuilder::default().with_state("x");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error naming the field
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert!(message.starts_with("State must be 2-128 characters"), "{message}");
        }
    }
}

/// **VALUE**: Verifies that the upper length bound counts characters, not bytes.
///
/// **WHY THIS MATTERS**: Details are user-facing and frequently non-ASCII. Counting bytes
/// would reject perfectly valid 128-character strings written in other scripts.
///
/// **BUG THIS CATCHES**: Would catch a regression from `chars().count()` to `len()`.
#[test]
fn given_128_multibyte_characters_when_building_then_accepts_details() {
    // GIVEN: Exactly 128 two-byte characters
    let details: String = std::iter::repeat_n('é', 128).collect();

    // WHEN: Building
    let result = ActivityBuilder::default().with_details(details).build();

    // THEN: Accepted
    assert!(result.is_ok(), "128 characters should be accepted");
}

/// **VALUE**: Verifies that non-http(s) URLs are rejected.
///
/// **WHY THIS MATTERS**: The companion renders these as clickable links. Other schemes are
/// refused by the companion and fail the request.
///
/// **BUG THIS CATCHES**: Would catch if scheme checking is removed.
#[test]
fn given_ftp_details_url_when_building_then_returns_validation_error() {
    // GIVEN: A builder with an ftp:// URL
    let builder = ActivityBuilder::default().with_details_url("ftp://example.com");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should fail
    match result.unwrap_err() {
        ModelError::Validation { message, .. } => {
            assert_eq!(message, "Invalid details URL format: ftp://example.com");
        }
    }
}

/// **VALUE**: Verifies party size invariants.
///
/// **WHY THIS MATTERS**: A party with zero members or a maximum below the current size
/// renders as nonsense ("3 of 2").
///
/// **BUG THIS CATCHES**: Would catch if size validation is dropped from the party builder.
#[test]
fn given_invalid_party_sizes_when_building_then_returns_validation_errors() {
    // GIVEN/WHEN: An empty party and an overfull party
    let empty = ActivityParty::builder("party", 0).build();
    let overfull = ActivityParty::builder("party", 3).with_maximum_size(2).build();
    let unlimited = ActivityParty::builder("party", 3).build();

    // THEN: The first two fail, the unlimited one is fine
    assert!(empty.is_err(), "current size 0 should be rejected");
    assert!(overfull.is_err(), "maximum below current should be rejected");
    let unlimited = unlimited.expect("maximum 0 means unlimited");
    assert_eq!(unlimited.current_size(), 3);
    assert_eq!(unlimited.maximum_size(), 0);
}
