use crate::ModelError;

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};

/// A group of players sharing the activity (lobby, team, server...).
///
/// `size` is `[current, maximum]`; a maximum of `0` hides the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityParty {
    pub id: String,
    pub size: [u32; 2],
    #[serde(default)]
    pub privacy: PartyPrivacy,
}

impl ActivityParty {
    pub fn builder(id: impl Into<String>, current_size: u32) -> ActivityPartyBuilder {
        ActivityPartyBuilder {
            id: id.into(),
            current_size,
            maximum_size: 0,
            privacy: PartyPrivacy::default(),
        }
    }

    pub fn current_size(&self) -> u32 {
        self.size[0]
    }

    pub fn maximum_size(&self) -> u32 {
        self.size[1]
    }
}

/// Whether others can join the party without an invitation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PartyPrivacy {
    #[default]
    Private,
    Public,
}

impl From<PartyPrivacy> for u8 {
    fn from(value: PartyPrivacy) -> Self {
        match value {
            PartyPrivacy::Private => 0,
            PartyPrivacy::Public => 1,
        }
    }
}

impl TryFrom<u8> for PartyPrivacy {
    type Error = ModelError;

    #[track_caller]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PartyPrivacy::Private),
            1 => Ok(PartyPrivacy::Public),
            other => Err(ModelError::Validation {
                message: format!("Unsupported party privacy: {other}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

#[derive(Debug)]
pub struct ActivityPartyBuilder {
    id: String,
    current_size: u32,
    maximum_size: u32,
    privacy: PartyPrivacy,
}

impl ActivityPartyBuilder {
    pub fn with_maximum_size(mut self, maximum_size: u32) -> Self {
        self.maximum_size = maximum_size;
        self
    }

    pub fn with_privacy(mut self, privacy: PartyPrivacy) -> Self {
        self.privacy = privacy;
        self
    }

    #[track_caller]
    pub fn build(self) -> Result<ActivityParty, ModelError> {
        if self.id.is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Party ID cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.current_size == 0 {
            return Err(ModelError::Validation {
                message: String::from("Party current size must be at least 1"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.maximum_size != 0 && self.maximum_size < self.current_size {
            return Err(ModelError::Validation {
                message: format!(
                    "Party maximum size {} is smaller than current size {}",
                    self.maximum_size, self.current_size
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(ActivityParty {
            id: self.id,
            size: [self.current_size, self.maximum_size],
            privacy: self.privacy,
        })
    }
}
