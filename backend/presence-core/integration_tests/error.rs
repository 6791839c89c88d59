use presence_core::discovery::SocketDiscovery;
use presence_core::error::discovery::DiscoveryError;
use presence_core::{ClientConfig, CoreError, IpcError, PresenceClient};

use common::ErrorLocation;

use std::io;

/// **VALUE**: Every error names where it was raised.
///
/// **WHY THIS MATTERS**: Logged errors are the only trace of a dropped
/// connection in the field.
#[test]
fn given_ipc_error_when_displayed_then_kind_message_and_location_appear() {
    // GIVEN an error raised here
    let error = IpcError::Disconnected {
        message: "Connection closed".to_string(),
        location: ErrorLocation::caller(),
    };

    // WHEN formatted
    let text = error.to_string();

    // THEN it reads "<Kind> Error: <message> [file:line:column]"
    assert!(text.starts_with("Disconnected Error: Connection closed ["));
    assert!(text.contains("error.rs:"));
    assert!(text.ends_with(']'));
}

#[test]
fn given_io_error_when_converted_then_location_is_the_conversion_site() {
    // GIVEN an io error
    let source = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");

    // WHEN converted with `?`-style From
    let line = line!() + 1;
    let error: IpcError = source.into();

    // THEN the location points at this file and line
    let IpcError::Io { message, location } = error else {
        panic!("Expected IpcError::Io");
    };
    assert_eq!(message, "pipe closed");
    assert!(location.file.ends_with("error.rs"));
    assert_eq!(location.line, line);
}

#[test]
fn given_only_decode_errors_when_checking_recoverable_then_others_are_fatal() {
    let location = ErrorLocation::caller();
    let decode = IpcError::FrameDecode {
        message: "bad json".to_string(),
        location,
    };
    let too_large = IpcError::FrameTooLarge {
        message: "20 MB".to_string(),
        location,
    };
    let read = IpcError::Read {
        message: "reset".to_string(),
        location,
    };

    assert!(decode.is_recoverable());
    assert!(!too_large.is_recoverable());
    assert!(!read.is_recoverable());
}

/// **VALUE**: CoreError is transparent over the error it wraps.
#[test]
fn given_discovery_error_when_wrapped_in_core_error_then_display_is_unchanged() {
    // GIVEN a discovery error
    let inner = DiscoveryError::NotFound {
        message: "No companion socket".to_string(),
        location: ErrorLocation::caller(),
    };
    let expected = inner.to_string();

    // WHEN wrapped
    let error = CoreError::from(inner);

    // THEN the text is the inner error's
    assert_eq!(error.to_string(), expected);
    assert!(expected.starts_with("Endpoint Not Found Error: No companion socket"));
}

#[test]
fn given_non_numeric_client_id_when_building_then_config_error() {
    // GIVEN a client id that is not a snowflake
    let builder = PresenceClient::builder("not-a-number");

    // WHEN building
    let result = builder.build();

    // THEN validation fails before any connection is attempted
    let Err(error) = result else {
        panic!("Expected a validation error");
    };
    assert!(matches!(error, CoreError::Config(_)));
    assert!(error.to_string().contains("Config Validation Error"));
}

#[test]
fn given_socket_index_out_of_range_when_building_discovery_then_validation_error() {
    let result = SocketDiscovery::new().with_socket_index(10);

    assert!(matches!(result, Err(DiscoveryError::Validation { .. })));
}

#[test]
fn given_missing_config_dir_when_saving_then_directory_is_created() {
    // GIVEN a config directory that does not exist yet
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("presence");
    let config = ClientConfig::new("1234567890");

    // WHEN saved
    config.save(&path).unwrap();

    // THEN it loads back unchanged
    let loaded = ClientConfig::load(&path).unwrap();
    assert_eq!(loaded.client_id, "1234567890");
    assert_eq!(loaded, config);
    assert!(path.join("config.json").exists());
}
