//! The activity shown on the user's profile.

pub mod assets;
pub mod builder;
pub mod party;
pub mod timestamps;

use crate::ModelError;
use crate::activity::assets::ActivityAssets;
use crate::activity::builder::ActivityBuilder;
use crate::activity::party::ActivityParty;
use crate::activity::timestamps::ActivityTimestamps;

use common::ErrorLocation;

use serde::{Deserialize, Serialize};

const MIN_TEXT_LENGTH: usize = 2;
const MAX_TEXT_LENGTH: usize = 128;

/// An activity published to the companion process.
///
/// Construct one through [`Activity::builder`], which validates text lengths
/// and URLs before anything reaches the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_display_type: Option<StatusDisplayType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<ActivityParty>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<ActivityAssets>,
}

impl Activity {
    pub fn builder() -> ActivityBuilder {
        ActivityBuilder::default()
    }
}

/// Kind of activity, sent as its integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActivityType {
    /// "Playing {application}"
    #[default]
    Playing,
    /// "Listening to {application}"
    Listening,
    /// "Watching {application}"
    Watching,
    /// "Competing in {application}"
    Competing,
}

impl From<ActivityType> for u8 {
    fn from(value: ActivityType) -> Self {
        match value {
            ActivityType::Playing => 0,
            ActivityType::Listening => 2,
            ActivityType::Watching => 3,
            ActivityType::Competing => 5,
        }
    }
}

impl TryFrom<u8> for ActivityType {
    type Error = ModelError;

    #[track_caller]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ActivityType::Playing),
            2 => Ok(ActivityType::Listening),
            3 => Ok(ActivityType::Watching),
            5 => Ok(ActivityType::Competing),
            other => Err(ModelError::Validation {
                message: format!("Unsupported activity type: {other}"),
                location: ErrorLocation::caller(),
            }),
        }
    }
}

/// Which field of the activity is shown in the user's status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StatusDisplayType {
    ApplicationName,
    State,
    Details,
}

impl From<StatusDisplayType> for u8 {
    fn from(value: StatusDisplayType) -> Self {
        match value {
            StatusDisplayType::ApplicationName => 0,
            StatusDisplayType::State => 1,
            StatusDisplayType::Details => 2,
        }
    }
}

impl TryFrom<u8> for StatusDisplayType {
    type Error = ModelError;

    #[track_caller]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusDisplayType::ApplicationName),
            1 => Ok(StatusDisplayType::State),
            2 => Ok(StatusDisplayType::Details),
            other => Err(ModelError::Validation {
                message: format!("Unsupported status display type: {other}"),
                location: ErrorLocation::caller(),
            }),
        }
    }
}

/// Check that a display string is within the accepted length range.
#[track_caller]
pub(crate) fn validate_text(field: &str, value: &str) -> Result<(), ModelError> {
    let length = value.chars().count();
    if !(MIN_TEXT_LENGTH..=MAX_TEXT_LENGTH).contains(&length) {
        return Err(ModelError::Validation {
            message: format!(
                "{field} must be {MIN_TEXT_LENGTH}-{MAX_TEXT_LENGTH} characters (got {length})"
            ),
            location: ErrorLocation::caller(),
        });
    }
    Ok(())
}

#[track_caller]
pub(crate) fn validate_url(field: &str, value: &str) -> Result<(), ModelError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ModelError::Validation {
            message: format!("Invalid {field} format: {value}"),
            location: ErrorLocation::caller(),
        });
    }
    Ok(())
}
